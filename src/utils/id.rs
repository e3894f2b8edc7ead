use chrono::Utc;
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix. 12 base36 digits is ~62 bits of entropy per
/// millisecond bucket.
const RANDOM_LEN: usize = 12;

/// Source of asset identifiers.
///
/// Identifiers must be URL-safe (`[A-Za-z0-9-]`) and unique with overwhelming
/// probability across concurrent callers. Collisions are not detected here.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// `{millis in base36}-{12 random base36 digits}`, e.g. `m2f9x1qk-4hz0c8r1p7ya`.
///
/// The timestamp prefix makes ids roughly sortable by creation time which
/// helps when reading logs or listing a bucket.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampIdGenerator;

impl IdGenerator for TimestampIdGenerator {
    fn new_id(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let mut rng = rand::thread_rng();
        let suffix: String = (0..RANDOM_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();

        format!("{}-{}", to_base36(millis), suffix)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
