/// Indonesia's bounding envelope. Candidates outside are rejected regardless
/// of score, guarding against name collisions in other countries.
pub const INDONESIA_LAT_MIN: f64 = -11.0;
pub const INDONESIA_LAT_MAX: f64 = 6.0;
pub const INDONESIA_LNG_MIN: f64 = 95.0;
pub const INDONESIA_LNG_MAX: f64 = 141.0;

/// Administrative-unit prefixes stripped before querying the provider.
/// Matched case-insensitively as standalone tokens; trailing dots are
/// ignored so "kec." and "kec" both match.
pub const ADMIN_PREFIXES: &[&str] = &[
    "desa",
    "kelurahan",
    "kel",
    "dusun",
    "kecamatan",
    "kec",
    "kabupaten",
    "kab",
    "kota",
    "provinsi",
    "prov",
];

/// Method tag written to the store for provider-resolved coordinates.
pub const METHOD_PROVIDER: &str = "provider";

/// Nominatim requires at least ~1 second between requests per client.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1100;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "FloodWarningSystem/2.0 (tyarawahyusaputra@gmail.com)";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_DB_PATH: &str = "flood_system.db";
