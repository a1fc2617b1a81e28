use hashdex_common::{Result, try_or_ret_some_err};
use hashdex_kv::Cursor;

/// Forward scan over association keys that start with `prefix`.
///
/// The scan stops at the first key outside the prefix; association keys of one
/// attribute digest are contiguous, so nothing past that point can match. An
/// empty prefix matches every key.
pub(crate) struct AssociationScan {
    cursor: Option<Cursor>,
    prefix: Vec<u8>,
}

impl AssociationScan {
    pub fn new(cursor: Cursor, prefix: Vec<u8>) -> AssociationScan {
        AssociationScan {
            cursor: Some(cursor),
            prefix,
        }
    }

    pub fn empty() -> AssociationScan {
        AssociationScan {
            cursor: None,
            prefix: Vec::new(),
        }
    }
}

impl Iterator for AssociationScan {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let (key, _) = try_or_ret_some_err!(cursor.next()?);
        if !key.starts_with(&self.prefix) {
            // Release the snapshot as soon as the run ends.
            self.cursor = None;
            return None;
        }
        Some(Ok(key))
    }
}
