//!
//! vitrina storage module
//! ----------------------
//! File-backed catalog store. The data root holds a `products.json` document
//! (the full product list) and an `images/` directory of uploaded blobs.
//! Writes rewrite the whole document; the catalog is small by design and a
//! single-file rewrite keeps recovery trivial.
//!
//! Key responsibilities:
//! - Product CRUD with submission-time validation (name and price required).
//! - Listing ordered by creation time, newest first.
//! - Image blob persistence under server-assigned random filenames.
//!
//! The public API centers around the `CatalogStore` type, which is wrapped in
//! a thread-safe `SharedCatalog` (`Arc<Mutex<CatalogStore>>`) by the server.

use std::{fs, path::{Path, PathBuf}};
use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use tracing::debug;

/// Validation and lookup failures from the catalog store.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("name and price are required")]
    MissingNameOrPrice,
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),
    #[error("invalid image filename")]
    InvalidImageName,
    #[error("image not found: {0}")]
    ImageNotFound(String),
}

/// A catalog entry. Wire names keep the store's original Spanish JSON
/// contract so existing exports remain readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "precio")]
    pub price: f64,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "imagen_url", default)]
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating a product. Everything but name and price is
/// optional; no invariants are enforced beyond their presence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProduct {
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "precio", default)]
    pub price: f64,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "imagen_url", default)]
    pub image_url: String,
}

/// On-disk catalog handle rooted at the configured data folder.
#[derive(Clone)]
pub struct CatalogStore {
    root: PathBuf,
}

impl CatalogStore {
    /// Create a new store rooted at the given filesystem path.
    /// The directory (and its images/ subfolder) is created if missing.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("images"))
            .with_context(|| format!("creating data root at {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &PathBuf { &self.root }

    fn products_path(&self) -> PathBuf { self.root.join("products.json") }

    fn images_dir(&self) -> PathBuf { self.root.join("images") }

    fn read_all(&self) -> Result<Vec<Product>> {
        let p = self.products_path();
        if !p.exists() { return Ok(Vec::new()); }
        let raw = fs::read_to_string(&p)
            .with_context(|| format!("reading catalog at {}", p.display()))?;
        let products: Vec<Product> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog at {}", p.display()))?;
        Ok(products)
    }

    fn write_all(&self, products: &[Product]) -> Result<()> {
        let p = self.products_path();
        let raw = serde_json::to_string_pretty(products)?;
        fs::write(&p, raw)
            .with_context(|| format!("writing catalog at {}", p.display()))?;
        Ok(())
    }

    /// List all products, newest first.
    pub fn list(&self) -> Result<Vec<Product>> {
        let mut products = self.read_all()?;
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    /// Insert a new product. Name must be non-blank and price positive;
    /// nothing else is validated at this layer.
    pub fn insert(&self, new: NewProduct) -> Result<Product> {
        if new.name.trim().is_empty() || new.price <= 0.0 {
            return Err(CatalogError::MissingNameOrPrice.into());
        }
        let mut products = self.read_all()?;
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            description: new.description,
            price: new.price,
            category: new.category,
            image_url: new.image_url,
            created_at: Utc::now(),
        };
        debug!(target: "vitrina::storage", "insert: id={} name='{}'", product.id, product.name);
        products.push(product.clone());
        self.write_all(&products)?;
        Ok(product)
    }

    /// Delete a product by id. Unknown ids are an error so the caller can
    /// report 404 rather than silently succeed.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut products = self.read_all()?;
        let before = products.len();
        products.retain(|p| p.id != id);
        if products.len() == before {
            return Err(CatalogError::ProductNotFound(id).into());
        }
        debug!(target: "vitrina::storage", "delete: id={}", id);
        self.write_all(&products)
    }

    /// Persist uploaded image bytes under a server-assigned random filename,
    /// preserving the extension of the client-supplied name. Returns the
    /// stored filename.
    pub fn store_image(&self, original_name: &str, bytes: &[u8]) -> Result<String> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) || ext.len() > 8 {
            return Err(CatalogError::InvalidImageName.into());
        }
        let file_name = format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase());
        let path = self.images_dir().join(&file_name);
        fs::write(&path, bytes)
            .with_context(|| format!("writing image at {}", path.display()))?;
        debug!(target: "vitrina::storage", "store_image: file='{}' bytes={}", file_name, bytes.len());
        Ok(file_name)
    }

    /// Read a stored image back. Filenames are restricted to the flat images/
    /// directory; separators and parent references are rejected.
    pub fn read_image(&self, file_name: &str) -> Result<Vec<u8>> {
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(CatalogError::InvalidImageName.into());
        }
        let path = self.images_dir().join(file_name);
        if !path.exists() {
            return Err(CatalogError::ImageNotFound(file_name.to_string()).into());
        }
        fs::read(&path).with_context(|| format!("reading image at {}", path.display()))
    }
}

/// Thread-safe catalog handle cloned into HTTP handlers.
#[derive(Clone)]
pub struct SharedCatalog(pub Arc<Mutex<CatalogStore>>);

impl SharedCatalog {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(CatalogStore::new(root)?))))
    }
}
