pub mod cbr_provider;
pub mod cbr_xml;

pub use cbr_provider::CbrProvider;
