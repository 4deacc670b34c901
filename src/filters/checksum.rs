//! SHA-256 digest of a binary file, as text. Converts binary to text.

use super::{Filter, FilterContext, FilterError};
use crate::cache::hash_file;
use crate::content::{Content, Kind};
use crate::rep::Outcome;

pub struct Checksum;

impl Filter for Checksum {
    fn input_kind(&self) -> Kind {
        Kind::Binary
    }

    fn output_kind(&self) -> Kind {
        Kind::Text
    }

    fn run(
        &self,
        input: &Content,
        _params: &toml::Table,
        _ctx: &FilterContext<'_>,
    ) -> Result<Outcome<Content>, FilterError> {
        let path = input
            .as_path()
            .ok_or_else(|| FilterError::Failed("checksum filter received text content".into()))?;
        Ok(Outcome::Ready(Content::Text(hash_file(path)?)))
    }
}
