use crate::*;

/// Indexed [`Todo`] fields, each backed by its own sled tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Done,
    Title,
    CreatedAt,
    UpdatedAt,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Done, Field::Title, Field::CreatedAt, Field::UpdatedAt];

    pub(crate) fn tree_name(self) -> &'static str {
        match self {
            Field::Done => "todo.idx.done",
            Field::Title => "todo.idx.title",
            Field::CreatedAt => "todo.idx.created_at",
            Field::UpdatedAt => "todo.idx.updated_at",
        }
    }
}

/// Value of an indexed field, used for lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Done(bool),
    Title(&'a str),
    CreatedAt(DateTime<Utc>),
    UpdatedAt(DateTime<Utc>),
}

impl<'a> FieldValue<'a> {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Done(_) => Field::Done,
            FieldValue::Title(_) => Field::Title,
            FieldValue::CreatedAt(_) => Field::CreatedAt,
            FieldValue::UpdatedAt(_) => Field::UpdatedAt,
        }
    }

    /// Order-preserving encoding, also the key prefix of every entry holding this value
    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            FieldValue::Done(done) => vec![*done as u8],
            FieldValue::Title(title) => {
                // length prefix keeps equal-prefix titles apart
                let mut bytes = Vec::with_capacity(4 + title.len());
                bytes.extend_from_slice(&(title.len() as u32).to_be_bytes());
                bytes.extend_from_slice(title.as_bytes());
                bytes
            }
            FieldValue::CreatedAt(ts) | FieldValue::UpdatedAt(ts) => encode_timestamp(ts),
        }
    }
}

/// Values of every indexed field of `todo`, in [`Field::ALL`] order
pub(crate) fn field_values(todo: &Todo) -> [FieldValue<'_>; 4] {
    [
        FieldValue::Done(todo.done),
        FieldValue::Title(&todo.title),
        FieldValue::CreatedAt(todo.created_at),
        FieldValue::UpdatedAt(todo.updated_at),
    ]
}

pub(crate) fn entry_key(value: &FieldValue, id: u64) -> Vec<u8> {
    let mut key = value.encode();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub(crate) fn id_from_entry(key: &[u8]) -> Option<u64> {
    let split = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[split..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

fn encode_timestamp(ts: &DateTime<Utc>) -> Vec<u8> {
    // flipping the sign bit makes negative seconds sort before positive ones
    let secs = (ts.timestamp() as u64) ^ (1 << 63);
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&secs.to_be_bytes());
    bytes.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        let mid = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let late = mid + chrono::Duration::nanoseconds(1);
        let keys: Vec<_> = [early, mid, late]
            .iter()
            .map(|ts| FieldValue::CreatedAt(*ts).encode())
            .collect();
        assert!(keys[0] < keys[1]);
        assert!(keys[1] < keys[2]);
    }

    #[test]
    fn title_prefixes_do_not_collide() {
        let short = entry_key(&FieldValue::Title("milk"), 1);
        let long = FieldValue::Title("milkshake").encode();
        assert!(!short.starts_with(&long));
        assert!(!long.starts_with(&FieldValue::Title("milk").encode()));
    }

    #[test]
    fn entry_keeps_id() {
        let key = entry_key(&FieldValue::Done(true), 42);
        assert_eq!(id_from_entry(&key), Some(42));
        assert_eq!(id_from_entry(&[1, 2]), None);
    }
}
