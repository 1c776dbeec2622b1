use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OidParseError;

/// Lowest `hi` of a valid oid: `62^10`. Anything at or above this value
/// needs exactly 11 base-62 digits.
pub const MIN_HI: u64 = 839_299_365_868_340_224;

/// One past the highest `hi` of a valid oid: `10 * 62^10`. Chosen below
/// `62^11` (which overflows `u64`) and as an exact multiple of 620 so the
/// bucket arithmetic has no remainder.
pub const MAX_HI: u64 = 8_392_993_658_683_402_240;

/// Lowest `lo` of a valid oid: `62^3`.
pub const MIN_LO: u32 = 238_328;

/// One past the highest `lo` of a valid oid: `62^5`.
pub const MAX_LO: u32 = 916_132_832;

/// Number of base-62 digits encoding `hi`.
pub const NB_DIGITS_HI: usize = 11;

/// Number of base-62 digits encoding `lo` (zero-padded; a `u32` needs at
/// most 6 natural digits).
pub const NB_DIGITS_LO: usize = 7;

/// Total length of the canonical form: `'_'` + 11 + 7.
pub const OID_LEN: usize = 1 + NB_DIGITS_HI + NB_DIGITS_LO;

/// Number of storage buckets oids shard into.
pub const BUCKET_COUNT: u64 = 620;

/// `hi` span covered by one bucket. `MAX_HI` divides evenly.
const BUCKET_SPAN: u64 = MAX_HI / BUCKET_COUNT;

/// Base-62 digits, in value order.
const B62_DIGITS: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A 96-bit object identifier with a fixed-width base-62 textual form.
///
/// An `Oid` is globally unique and names an object for its whole life,
/// in memory and in snapshots. The canonical form is always exactly
/// [`OID_LEN`] characters: a `'_'` separator followed by 11 digits for
/// `hi` and 7 zero-padded digits for `lo`, e.g. `_44bkENMW4FM00udD59`.
///
/// The all-zero oid is the distinguished null value. It is exempt from
/// the band checks, prints as `_000000000000000000`, and is not a valid
/// object name.
///
/// Oids from untrusted input (snapshot files, user text) must go through
/// [`Oid::try_parse`]; the trusted constructor [`Oid::new`] panics on
/// out-of-band input.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid {
    hi: u64,
    lo: u32,
}

impl Oid {
    /// The null oid.
    pub const fn null() -> Self {
        Self { hi: 0, lo: 0 }
    }

    /// Trusted constructor.
    ///
    /// # Panics
    ///
    /// Panics if `(hi, lo)` is neither all-zero nor inside the valid band
    /// with a non-zero hash. Callers holding untrusted text must use
    /// [`Oid::try_parse`] instead.
    pub fn new(hi: u64, lo: u32) -> Self {
        let oid = Self { hi, lo };
        if oid.is_null() {
            return oid;
        }
        assert!(
            (MIN_HI..MAX_HI).contains(&hi) && (MIN_LO..MAX_LO).contains(&lo),
            "oid out of band: hi={hi}, lo={lo}"
        );
        assert!(oid.hash() != 0, "oid has zero hash: hi={hi}, lo={lo}");
        oid
    }

    /// Unchecked constant constructor for well-known oids.
    ///
    /// Validity is the caller's contract; prefer [`Oid::new`] everywhere
    /// a `const` context is not required.
    pub const fn from_raw(hi: u64, lo: u32) -> Self {
        Self { hi, lo }
    }

    /// Generate a fresh random oid by rejection sampling.
    ///
    /// Draws `hi` uniformly from `[0, MAX_HI)` and `lo` from
    /// `[0, MAX_LO)`, retrying until both land in their valid bands and
    /// the hash is non-zero. The per-draw acceptance probability is high
    /// enough that the loop terminates after a handful of iterations in
    /// practice.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let hi = rng.gen_range(0..MAX_HI);
            let lo = rng.gen_range(0..MAX_LO);
            let oid = Self { hi, lo };
            if (MIN_HI..MAX_HI).contains(&hi)
                && (MIN_LO..MAX_LO).contains(&lo)
                && oid.hash() != 0
            {
                return oid;
            }
        }
    }

    /// The high 64 bits.
    pub const fn hi(self) -> u64 {
        self.hi
    }

    /// The low 32 bits.
    pub const fn lo(self) -> u32 {
        self.lo
    }

    /// Returns `true` for the all-zero null oid.
    pub const fn is_null(self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// Returns `true` if this oid names an object: both parts inside
    /// their valid bands and the hash non-zero. The null oid is not
    /// valid.
    pub fn is_valid(self) -> bool {
        MIN_HI <= self.hi
            && self.hi < MAX_HI
            && MIN_LO <= self.lo
            && self.lo < MAX_LO
            && self.hash() != 0
    }

    /// Combined 32-bit hash. Non-zero for every valid oid.
    pub fn hash(self) -> u32 {
        let h = (self.hi % 2_147_473_837) ^ ((self.hi >> 32) ^ (u64::from(self.lo) * 17 + 201_151));
        h as u32
    }

    /// Storage bucket in `0..=619` for valid oids (the null oid maps to
    /// bucket 0). Used to shard the object table for locality.
    pub const fn bucket(self) -> u64 {
        self.hi / BUCKET_SPAN
    }

    /// The canonical 19-character textual form.
    pub fn to_canonical_string(self) -> String {
        let mut buf = [0u8; OID_LEN];
        buf[0] = b'_';
        encode_b62(self.hi, &mut buf[1..1 + NB_DIGITS_HI]);
        encode_b62(u64::from(self.lo), &mut buf[1 + NB_DIGITS_HI..]);
        // The buffer holds only ASCII from the digit table.
        String::from_utf8(buf.to_vec()).expect("base-62 output is ASCII")
    }

    /// Parse a canonical 19-character oid string.
    ///
    /// Malformed input (wrong length, missing separator, a character
    /// outside the base-62 alphabet, or a decoded value outside the valid
    /// band) is reported as a typed error, never a panic. The all-zero
    /// digit string parses to the null oid.
    pub fn try_parse(text: &str) -> Result<Self, OidParseError> {
        let bytes = text.as_bytes();
        if bytes.len() != OID_LEN {
            return Err(OidParseError::WrongLength(bytes.len()));
        }
        if bytes[0] != b'_' {
            return Err(OidParseError::MissingSeparator);
        }
        let hi_wide = decode_b62(&bytes[1..1 + NB_DIGITS_HI], 1)?;
        let lo_wide = decode_b62(&bytes[1 + NB_DIGITS_HI..], 1 + NB_DIGITS_HI)?;
        if hi_wide == 0 && lo_wide == 0 {
            return Ok(Self::null());
        }
        if hi_wide < u128::from(MIN_HI) || hi_wide >= u128::from(MAX_HI) {
            return Err(OidParseError::OutOfBand);
        }
        if lo_wide < u128::from(MIN_LO) || lo_wide >= u128::from(MAX_LO) {
            return Err(OidParseError::OutOfBand);
        }
        let oid = Self {
            hi: hi_wide as u64,
            lo: lo_wide as u32,
        };
        if oid.hash() == 0 {
            return Err(OidParseError::ZeroHash);
        }
        Ok(oid)
    }
}

/// Encode `value` into `out` as fixed-width base-62, most significant
/// digit first, zero-padded.
fn encode_b62(mut value: u64, out: &mut [u8]) {
    for slot in out.iter_mut().rev() {
        *slot = B62_DIGITS[(value % 62) as usize];
        value /= 62;
    }
    debug_assert_eq!(value, 0, "value does not fit the digit width");
}

/// Decode fixed-width base-62 digits. Widened to `u128` because 11
/// digits can exceed `u64::MAX`; band checks happen at the call site.
fn decode_b62(digits: &[u8], offset: usize) -> Result<u128, OidParseError> {
    let mut value: u128 = 0;
    for (i, &b) in digits.iter().enumerate() {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'z' => 10 + b - b'a',
            b'A'..=b'Z' => 36 + b - b'A',
            _ => {
                return Err(OidParseError::BadDigit {
                    index: offset + i,
                    ch: char::from(b),
                })
            }
        };
        value = value * 62 + u128::from(digit);
    }
    Ok(value)
}

impl Default for Oid {
    fn default() -> Self {
        Self::null()
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_canonical_string())
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::try_parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_is_fixed_width() {
        for _ in 0..64 {
            let oid = Oid::random();
            let text = oid.to_canonical_string();
            assert_eq!(text.len(), OID_LEN);
            assert!(text.starts_with('_'));
        }
    }

    #[test]
    fn parse_roundtrip() {
        for _ in 0..256 {
            let oid = Oid::random();
            let parsed = Oid::try_parse(&oid.to_canonical_string()).unwrap();
            assert_eq!(oid, parsed);
        }
    }

    #[test]
    fn known_encodings() {
        let cases = [
            (839_299_365_868_340_224u64, 238_328u32, "_100000000000001000"),
            (8_392_993_658_683_402_239, 916_132_831, "_9ZZZZZZZZZZ00ZZZZZ"),
            (1_678_598_731_860_137_237, 892_649, "_2000008m0Kx0003Kdz"),
            (3_413_820_300_735_010_366, 446_538_579, "_44bkENMW4FM00udD59"),
        ];
        for (hi, lo, text) in cases {
            let oid = Oid::new(hi, lo);
            assert_eq!(oid.to_canonical_string(), text);
            assert_eq!(Oid::try_parse(text).unwrap(), oid);
        }
    }

    #[test]
    fn random_is_valid_with_nonzero_hash() {
        for _ in 0..256 {
            let oid = Oid::random();
            assert!(oid.is_valid());
            assert!(!oid.is_null());
            assert_ne!(oid.hash(), 0);
        }
    }

    #[test]
    fn bucket_stays_in_range() {
        for _ in 0..256 {
            let oid = Oid::random();
            assert!(oid.bucket() <= BUCKET_COUNT);
        }
        assert_eq!(Oid::new(MIN_HI, MIN_LO).bucket(), 62);
        assert_eq!(Oid::new(MAX_HI - 1, MAX_LO - 1).bucket(), 619);
    }

    #[test]
    fn ordering_is_total_and_lexicographic() {
        let a = Oid::new(MIN_HI, MIN_LO);
        let b = Oid::new(MIN_HI, MIN_LO + 1);
        let c = Oid::new(MIN_HI + 1, MIN_LO);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
        for _ in 0..64 {
            let x = Oid::random();
            let y = Oid::random();
            let forward = x.cmp(&y);
            assert_eq!(forward.reverse(), y.cmp(&x));
            assert_eq!(forward == std::cmp::Ordering::Equal, x == y);
        }
    }

    #[test]
    fn null_oid_roundtrips() {
        let null = Oid::null();
        assert!(null.is_null());
        assert!(!null.is_valid());
        assert_eq!(null.to_canonical_string(), "_000000000000000000");
        assert_eq!(Oid::try_parse("_000000000000000000").unwrap(), null);
    }

    #[test]
    fn new_accepts_null() {
        assert!(Oid::new(0, 0).is_null());
    }

    #[test]
    #[should_panic(expected = "oid out of band")]
    fn new_panics_below_band() {
        let _ = Oid::new(MIN_HI - 1, MIN_LO);
    }

    #[test]
    #[should_panic(expected = "oid out of band")]
    fn new_panics_above_band() {
        let _ = Oid::new(MIN_HI, MAX_LO);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            Oid::try_parse("_100000000000001"),
            Err(OidParseError::WrongLength(16))
        );
        assert_eq!(Oid::try_parse(""), Err(OidParseError::WrongLength(0)));
        assert_eq!(
            Oid::try_parse("_1000000000000010001"),
            Err(OidParseError::WrongLength(20))
        );
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert_eq!(
            Oid::try_parse("X100000000000001000"),
            Err(OidParseError::MissingSeparator)
        );
    }

    #[test]
    fn parse_rejects_bad_digit() {
        assert_eq!(
            Oid::try_parse("_10000000!000001000"),
            Err(OidParseError::BadDigit { index: 9, ch: '!' })
        );
        // Multibyte characters fail the byte-length check first.
        assert!(Oid::try_parse("_10000000é00001000").is_err());
    }

    #[test]
    fn parse_rejects_out_of_band() {
        // 11 z digits decode above u64::MAX; the wide decode must not wrap.
        assert_eq!(
            Oid::try_parse("_zzzzzzzzzzz0001000"),
            Err(OidParseError::OutOfBand)
        );
        // hi below 62^10.
        assert_eq!(
            Oid::try_parse("_0Zzzzzzzzzz0001000"),
            Err(OidParseError::OutOfBand)
        );
        // lo below 62^3.
        assert_eq!(
            Oid::try_parse("_100000000000000100"),
            Err(OidParseError::OutOfBand)
        );
        // lo at or above 62^5.
        assert_eq!(
            Oid::try_parse("_100000000001000000"),
            Err(OidParseError::OutOfBand)
        );
    }

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(Oid::new(MIN_HI, MIN_LO).hash(), 1_384_978_052);
        assert_eq!(Oid::new(MAX_HI - 1, MAX_LO - 1).hash(), 2_854_591_100);
        assert_eq!(
            Oid::new(3_413_820_300_735_010_366, 446_538_579).hash(),
            2_932_600_047
        );
    }

    #[test]
    fn serde_uses_canonical_string() {
        let oid = Oid::new(1_678_598_731_860_137_237, 892_649);
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, "\"_2000008m0Kx0003Kdz\"");
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
        assert!(serde_json::from_str::<Oid>("\"not an oid\"").is_err());
    }

    #[test]
    fn display_and_debug() {
        let oid = Oid::new(3_413_820_300_735_010_366, 446_538_579);
        assert_eq!(format!("{oid}"), "_44bkENMW4FM00udD59");
        assert_eq!(format!("{oid:?}"), "Oid(_44bkENMW4FM00udD59)");
    }
}
