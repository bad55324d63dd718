//! Credential payload codec.
//!
//! The QR image itself is produced and read elsewhere; this module owns the
//! text it carries, a compact JSON 4-tuple:
//!
//! ```text
//! ["ABC1-005","2024-01-01T00:00:00.000Z",40.0,-73.0]
//!   subject    issued at (UTC, ms)      lat  lon
//! ```
//!
//! Decoding is the structural gate in front of the verifier. Anything that is
//! not exactly `(string, string, number, number)` is rejected here and never
//! reaches verification or the ledger.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use copresence_env::Coordinate;
use serde_json::Value;
use thiserror::Error;

use crate::identity::{Identity, IdentityError, IdentityRule};

/// Fields in a payload tuple.
const PAYLOAD_ARITY: usize = 4;

/// Structural problems with a scanned payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CredentialError {
    #[error("Invalid QR data: {0}")]
    Malformed(String),
    
    #[error("Invalid QR format: {0}")]
    Shape(String),
    
    #[error("Invalid subject: {0}")]
    Subject(#[from] IdentityError),
    
    #[error("Invalid issue time {0:?}")]
    IssuedAt(String),
}

/// A decoded credential. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    subject: Identity,
    issued_at: DateTime<Utc>,
    location: Coordinate,
}

impl Credential {
    pub fn new(subject: Identity, issued_at: DateTime<Utc>, location: Coordinate) -> Self {
        Self {
            subject,
            issued_at,
            location,
        }
    }
    
    pub fn subject(&self) -> &Identity {
        &self.subject
    }
    
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
    
    pub fn location(&self) -> Coordinate {
        self.location
    }
    
    /// Parses and structurally validates payload text.
    pub fn decode(payload: &str, rule: &IdentityRule) -> Result<Self, CredentialError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        Self::from_value(&value, rule)
    }
    
    /// Validates an already-parsed payload.
    pub fn from_value(value: &Value, rule: &IdentityRule) -> Result<Self, CredentialError> {
        let fields = value
            .as_array()
            .ok_or_else(|| CredentialError::Shape("expected a JSON array".to_string()))?;
        
        if fields.len() != PAYLOAD_ARITY {
            return Err(CredentialError::Shape(format!(
                "expected {} fields, found {}",
                PAYLOAD_ARITY,
                fields.len()
            )));
        }
        
        let (Value::String(subject), Value::String(issued_at), Value::Number(lat), Value::Number(lon)) =
            (&fields[0], &fields[1], &fields[2], &fields[3])
        else {
            return Err(CredentialError::Shape(
                "expected (string, string, number, number)".to_string(),
            ));
        };
        
        let subject = rule.parse(subject)?;
        let issued_at = DateTime::parse_from_rfc3339(issued_at)
            .map_err(|_| CredentialError::IssuedAt(issued_at.clone()))?
            .with_timezone(&Utc);
        // JSON numbers always widen to f64
        let lat = lat.as_f64().unwrap_or(f64::NAN);
        let lon = lon.as_f64().unwrap_or(f64::NAN);
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CredentialError::Shape("non-numeric coordinate".to_string()));
        }
        
        Ok(Self::new(subject, issued_at, Coordinate::new(lat, lon)))
    }
    
    /// Renders the payload text carried by the QR code.
    pub fn encode(&self) -> String {
        serde_json::json!([
            self.subject.as_str(),
            self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.location.latitude(),
            self.location.longitude(),
        ])
        .to_string()
    }
}

/// A freshly generated credential with its display window.
///
/// The window only drives the "scan within" countdown on the issuing device;
/// acceptance is decided by the scanner's verification policy.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCredential {
    pub credential: Credential,
    pub valid_for: Duration,
}

impl IssuedCredential {
    pub fn new(credential: Credential, valid_for: Duration) -> Self {
        Self { credential, valid_for }
    }
    
    /// End of the countdown, saturating at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.credential
            .issued_at
            .checked_add_signed(self.valid_for)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
    
    /// Whole seconds left on the countdown (0 once expired).
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        let left = self.expires_at() - now;
        left.num_seconds().max(0) as u64
    }
    
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
    
    pub fn payload(&self) -> String {
        self.credential.encode()
    }
    
    /// Two-line issue stamp for the operator, e.g.
    /// `Monday, January 1, 2024` / `12:00:00 AM UTC`.
    pub fn issued_stamp(&self) -> String {
        let at = self.credential.issued_at;
        format!("{}\n{}", at.format("%A, %B %-d, %Y"), at.format("%I:%M:%S %p UTC"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn rule() -> IdentityRule {
        IdentityRule::default()
    }
    
    #[test]
    fn test_decode_valid_payload() {
        let c = Credential::decode(r#"["ABC1-005","2024-01-01T00:00:00.000Z",40.000000,-73.000000]"#, &rule()).unwrap();
        
        assert_eq!(c.subject().as_str(), "ABC1-005");
        assert_eq!(c.issued_at().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(c.location(), Coordinate::new(40.0, -73.0));
    }
    
    #[test]
    fn test_decode_integer_coordinates() {
        let c = Credential::decode(r#"["ABC1-005","2024-01-01T00:00:00Z",40,-73]"#, &rule()).unwrap();
        assert_eq!(c.location(), Coordinate::new(40.0, -73.0));
    }
    
    #[test]
    fn test_decode_rejects_bad_json() {
        let err = Credential::decode("not json", &rule()).unwrap_err();
        assert!(matches!(err, CredentialError::Malformed(_)));
    }
    
    #[test]
    fn test_decode_rejects_wrong_shapes() {
        let shapes = [
            r#"{"id":"ABC1-005"}"#,
            r#"["ABC1-005","2024-01-01T00:00:00.000Z",40.0]"#,
            r#"["ABC1-005","2024-01-01T00:00:00.000Z",40.0,-73.0,1]"#,
            r#"["ABC1-005","2024-01-01T00:00:00.000Z","40.0",-73.0]"#,
            r#"["ABC1-005","2024-01-01T00:00:00.000Z",40.0,null]"#,
            r#"[5,"2024-01-01T00:00:00.000Z",40.0,-73.0]"#,
            r#"["ABC1-005",1704067200000,40.0,-73.0]"#,
        ];
        for payload in shapes {
            let err = Credential::decode(payload, &rule()).unwrap_err();
            assert!(matches!(err, CredentialError::Shape(_)), "{payload} gave {err:?}");
        }
    }
    
    #[test]
    fn test_decode_rejects_bad_subject() {
        let err = Credential::decode(r#"["ABC1-000","2024-01-01T00:00:00.000Z",40.0,-73.0]"#, &rule()).unwrap_err();
        assert!(matches!(err, CredentialError::Subject(_)));
    }
    
    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let err = Credential::decode(r#"["ABC1-005","yesterday",40.0,-73.0]"#, &rule()).unwrap_err();
        assert_eq!(err, CredentialError::IssuedAt("yesterday".to_string()));
    }
    
    #[test]
    fn test_encode_matches_wire_format() {
        let subject = rule().parse("ABC1-005").unwrap();
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let c = Credential::new(subject, at, Coordinate::new(40.0001, -73.5));
        
        assert_eq!(c.encode(), r#"["ABC1-005","2024-01-01T00:00:00.000Z",40.0001,-73.5]"#);
        assert_eq!(Credential::decode(&c.encode(), &rule()).unwrap(), c);
    }
    
    #[test]
    fn test_issued_countdown() {
        let subject = rule().parse("ABC1-005").unwrap();
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let issued = IssuedCredential::new(Credential::new(subject, at, Coordinate::new(0.0, 0.0)), Duration::seconds(15));
        
        assert_eq!(issued.seconds_remaining(at), 15);
        assert_eq!(issued.seconds_remaining(at + Duration::milliseconds(4_500)), 10);
        assert!(!issued.is_expired(at + Duration::seconds(14)));
        assert!(issued.is_expired(at + Duration::seconds(15)));
        assert_eq!(issued.seconds_remaining(at + Duration::seconds(40)), 0);
        assert_eq!(issued.issued_stamp(), "Monday, January 1, 2024\n12:00:00 AM UTC");
    }
    
    #[test]
    fn test_expiry_saturates_instead_of_overflowing() {
        let subject = rule().parse("ABC1-005").unwrap();
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let issued = IssuedCredential::new(
            Credential::new(subject, at, Coordinate::new(0.0, 0.0)),
            Duration::days(100_000_000),
        );
        
        assert_eq!(issued.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!issued.is_expired(at + Duration::days(365)));
        assert!(issued.seconds_remaining(at) > 0);
    }
}
