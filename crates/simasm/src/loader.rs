//! Source loader: strips comments, binds labels and yields one cleaned
//! instruction line per source instruction.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// One cleaned instruction with the 1-based source line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Loader output: instruction lines in program order plus the label table.
///
/// Every label maps to an index into `lines`, or to `lines.len()` when it is
/// declared after the last instruction.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub lines: Vec<SourceLine>,
    pub labels: HashMap<String, usize>,
}

impl Listing {
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub fn load_file(path: &Path) -> Result<Listing> {
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_source(&text)
}

pub fn load_source(text: &str) -> Result<Listing> {
    let mut listing = Listing::default();

    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        let code = raw.split_once(';').map_or(raw, |(code, _comment)| code);

        let mut tokens = Vec::new();
        for token in code
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            if let Some(label) = token.strip_suffix(':') {
                // Bound to whatever instruction is emitted next.
                let next = listing.lines.len();
                match listing.labels.entry(label.to_string()) {
                    Entry::Occupied(_) => {
                        return Err(Error::DuplicateLabel {
                            line: number,
                            label: label.to_string(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(next);
                    }
                }
                continue;
            }
            tokens.push(token);
        }

        if !tokens.is_empty() {
            listing.lines.push(SourceLine {
                number,
                text: tokens.join(" "),
            });
        }
    }

    tracing::debug!(
        instructions = listing.lines.len(),
        labels = listing.labels.len(),
        "loaded program"
    );
    Ok(listing)
}
