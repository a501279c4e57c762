use thiserror::Error;

/// Crate-wide error type, aggregating failures from the standard library,
/// dependencies and internal modules.
#[derive(Error, Debug)]
pub enum SheetError {
    // Standard library errors
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncoding(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncoding(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    // Internal module errors
    #[error("{0}")]
    XmlHelper(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff12(#[from] crate::biff12::Biff12Error),

    #[error("{0}")]
    Workbook(#[from] crate::workbook::WorkbookError),

    #[error("{0}")]
    Column(#[from] crate::column::ColumnError),
}
