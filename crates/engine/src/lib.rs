pub mod formula;
pub mod locale;

pub use locale::{Locale, LocaleProvider};
