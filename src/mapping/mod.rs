mod bean;
mod converter;
mod extractor;
mod mapper;

pub use self::bean::{Bean, BeanRowMapper, Property, PropertyTable};
pub use self::converter::{ConversionResult, Converter, ConverterRegistry, StringToUuid};
pub use self::extractor::{optional_single_result, single_result, DefaultExtractor, RowExtractor};
pub use self::mapper::{RowMapper, SingleColumnMapper};
