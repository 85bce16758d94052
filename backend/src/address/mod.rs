//! Free-text street addresses.
//!
//! ```text
//! "Hauptstrasse 12a"  --lexer-->  [Word, HouseNumber(12, "a")]
//!                     --parser--> Street { name: "Hauptstrasse", number: 12a }
//! ```

pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod street;

pub use parser::{parse_house_number, parse_street};
pub use street::{HouseNumber, Street, StreetNumber, StreetNumberRange, StreetNumberSuffixRange};
