//! Core traits for document representation and serialization.
//!
//! Every record stored through a typed collection implements [`Document`];
//! [`DocumentExt`] converts it to and from BSON.

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// Field that carries a document's identifier in its serialized form.
pub const ID_FIELD: &str = "id";

/// Core trait that all documents stored in a document store must implement.
///
/// Every document has a unique identifier and names the collection it belongs to.
/// The identifier serializes under [`ID_FIELD`]; backends with a native key
/// (MongoDB's `_id`) keep it there instead of storing it twice.
///
/// # Example
///
/// ```ignore
/// use bookstore_core::document::Document;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Book {
///     pub id: Uuid,
///     pub title: String,
/// }
///
/// impl Document for Book {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "books"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the default name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing BSON conversion for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}
