pub mod field;
pub mod record;
pub mod token;

pub use field::{Field, FieldDraft, FieldType};
pub use record::{Answers, CheckInRecord};
pub use token::SecurityToken;
