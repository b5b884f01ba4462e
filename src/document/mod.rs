pub mod reader;
pub mod tree;
pub mod writer;

pub use reader::read_document;
pub use tree::{Element, Node, XmlDocument, XSD_NAMESPACE, XSI_NAMESPACE};
pub use writer::write_document_new;
