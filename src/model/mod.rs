//! Data model shared by every pipeline stage.
//!
//! The parser produces a [`ParseResult`]; the importer turns it into one
//! [`Dataset`] and many [`ImageRecord`]s for the catalog.
//!
//! Like the label files they come from, these types are permissive: boxes
//! are stored unclamped and class ids may point past the class table.
//!
//! # Example
//!
//! ```
//! use yolo_ingest::model::{Annotation, BBoxXYWHN, ClassTable};
//!
//! let classes = ClassTable::from(vec!["person".to_string(), "car".to_string()]);
//! let ann = Annotation::resolve(5, BBoxXYWHN::new(0.5, 0.5, 0.2, 0.3), &classes);
//! assert_eq!(ann.class_name, "5");
//! ```

mod bbox;
mod ids;
mod locator;
#[allow(clippy::module_inception)]
mod model;

pub use bbox::BBoxXYWHN;
pub use ids::{DatasetId, ImageId};
pub use locator::{LocatorParseError, StorageLocator};
pub use model::{
    dataset_key_prefix, Annotation, ClassTable, Dataset, ImageRecord, ParseResult, ParsedImage,
};
