mod chromosome;
mod key;
mod metadata;
pub(crate) mod utils;

pub use chromosome::{Chromosome, Interval, Position};
pub use key::{BucketKey, KEY_SIZE, MAX_BUCKET_INDEX};
pub use metadata::{Assembly, Metadata};
