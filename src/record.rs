//! Synthetic benchmark records and their generator.
//!
//! Every backend stores the same record shape so that timings are comparable.
//! The generator is seeded explicitly; worker threads derive their own
//! independent streams with [`RecordGenerator::for_worker`].

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use time::{Duration, OffsetDateTime};

/// Length of the `secret` payload in hex characters.
pub const DEFAULT_SECRET_LEN: usize = 512;
/// Inclusive upper bound for generated foreign-key style ids.
pub const MAX_REFERENCE_ID: i64 = 100_000_000;
/// Timestamps are drawn within this many minutes either side of "now".
pub const TIMESTAMP_SPREAD_MINUTES: i64 = 100;

const URL_TOKEN_BYTES: usize = 5;

/// Milliseconds since the Unix epoch, the storage representation shared by
/// every backend.
pub fn epoch_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Polymorphic owner type of the `related_to_id` reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelatedToType {
    /// `Event`
    Event,
    /// `User`
    User,
    /// `Home`
    Home,
    /// `Component`
    Component,
}

impl RelatedToType {
    /// Every allowed value, in draw order.
    pub const ALL: [RelatedToType; 4] = [
        RelatedToType::Event,
        RelatedToType::User,
        RelatedToType::Home,
        RelatedToType::Component,
    ];

    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RelatedToType::Event => "Event",
            RelatedToType::User => "User",
            RelatedToType::Home => "Home",
            RelatedToType::Component => "Component",
        }
    }
}

impl fmt::Display for RelatedToType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row/document written by the benchmarks. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticRecord {
    /// `https://example.com/<token>-<sequence>`
    pub url: String,
    /// Large hex payload.
    pub secret: String,
    /// Creator reference.
    pub creator_id: i64,
    /// Owner reference.
    pub owner_id: i64,
    /// Polymorphic reference id.
    pub related_to_id: i64,
    /// Polymorphic reference type.
    pub related_to_type: RelatedToType,
    /// Log timestamp.
    pub logged_at: OffsetDateTime,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Update timestamp.
    pub updated_at: OffsetDateTime,
}

/// Produces [`SyntheticRecord`]s from a seeded ChaCha stream.
#[derive(Clone, Debug)]
pub struct RecordGenerator {
    seed: u64,
    rng: ChaCha8Rng,
    secret_len: usize,
    sequence: u64,
}

impl RecordGenerator {
    /// Creates a generator on stream 0 of `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            secret_len: DEFAULT_SECRET_LEN,
            sequence: 0,
        }
    }

    /// Overrides the secret length (hex characters).
    pub fn with_secret_len(mut self, secret_len: usize) -> Self {
        self.secret_len = secret_len;
        self
    }

    /// Configured secret length.
    pub fn secret_len(&self) -> usize {
        self.secret_len
    }

    /// Derives a generator for worker `index` that never overlaps with the
    /// parent or with any other worker index.
    pub fn for_worker(&self, index: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64 + 1);
        Self {
            seed: self.seed,
            rng,
            secret_len: self.secret_len,
            sequence: 0,
        }
    }

    /// Lazily yields exactly `count` fresh records.
    pub fn generate(&mut self, count: usize) -> impl Iterator<Item = SyntheticRecord> + '_ {
        (0..count).map(move |_| self.next_record())
    }

    /// Draws a single record.
    pub fn next_record(&mut self) -> SyntheticRecord {
        let now = OffsetDateTime::now_utc();
        let sequence = self.sequence;
        self.sequence += 1;
        let token = self.hex(URL_TOKEN_BYTES * 2);
        SyntheticRecord {
            url: format!("https://example.com/{token}-{sequence}"),
            secret: self.hex(self.secret_len),
            creator_id: self.reference_id(),
            owner_id: self.reference_id(),
            related_to_id: self.reference_id(),
            related_to_type: RelatedToType::ALL[self.rng.gen_range(0..RelatedToType::ALL.len())],
            logged_at: self.timestamp(now),
            created_at: self.timestamp(now),
            updated_at: self.timestamp(now),
        }
    }

    fn reference_id(&mut self) -> i64 {
        self.rng.gen_range(1..=MAX_REFERENCE_ID)
    }

    fn timestamp(&mut self, now: OffsetDateTime) -> OffsetDateTime {
        let minutes = self
            .rng
            .gen_range(-TIMESTAMP_SPREAD_MINUTES..=TIMESTAMP_SPREAD_MINUTES);
        now - Duration::minutes(minutes)
    }

    fn hex(&mut self, chars: usize) -> String {
        let mut bytes = vec![0u8; chars.div_ceil(2)];
        self.rng.fill(&mut bytes[..]);
        let mut out = hex::encode(bytes);
        out.truncate(chars);
        out
    }
}
