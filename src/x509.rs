//! Types common to all things X.509.

use std::{error, fmt, io, ops};
use std::convert::Infallible;
use std::str::FromStr;
use bcder::{decode, encode};
use bcder::{
    BitString, Captured, ConstOid, Mode, OctetString, Oid, Tag, Unsigned,
};
use bcder::decode::{DecodeError, ContentError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use chrono::{
    Datelike, DateTime, SubsecRound, TimeDelta, Timelike, TimeZone, Utc
};
use crate::oid;
use crate::crypto::{
    PublicKey, Signature, SignatureAlgorithm, SignatureVerificationError,
    Signer,
};


//------------ Functions -----------------------------------------------------

/// Returns an encoder for a single certificate extension.
pub fn encode_extension<V: encode::Values>(
    oid: &'static ConstOid,
    critical: bool,
    content: V
) -> impl encode::Values {
    encode::sequence((
        oid.encode(),
        if critical {
            Some(critical.encode())
        }
        else {
            None
        },
        OctetString::encode_wrapped(Mode::Der, content)
    ))
}


//------------ NameAttributes ------------------------------------------------

/// The attribute values for building a distinguished name.
///
/// Empty values are left out of the name.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameAttributes<'a> {
    pub country: &'a str,
    pub state: &'a str,
    pub locality: &'a str,
    pub organization: &'a str,
    pub organizational_unit: &'a str,
    pub common_name: &'a str,
}


//------------ Name ----------------------------------------------------------

/// A distinguished name.
///
/// The name is kept in its encoded form. Two names are equal if their
/// encodings are identical.
#[derive(Clone, Debug)]
pub struct Name(Captured);

impl Name {
    /// Creates a name from attribute values.
    ///
    /// Each non-empty value becomes its own relative distinguished name, in
    /// the order C, ST, L, O, OU, CN. The country is encoded as a
    /// PrintableString, all others as UTF8String.
    pub fn from_attributes(attrs: NameAttributes) -> Self {
        fn rdn<'a>(
            oid: &'static ConstOid, tag: Tag, value: &'a str
        ) -> Option<impl encode::Values + 'a> {
            if value.is_empty() {
                return None
            }
            Some(encode::set(
                encode::sequence((
                    oid.encode(),
                    value.as_bytes().encode_as(tag),
                ))
            ))
        }

        let values = encode::sequence((
            rdn(&oid::AT_COUNTRY_NAME, Tag::PRINTABLE_STRING, attrs.country),
            rdn(&oid::AT_STATE_NAME, Tag::UTF8_STRING, attrs.state),
            rdn(&oid::AT_LOCALITY_NAME, Tag::UTF8_STRING, attrs.locality),
            rdn(
                &oid::AT_ORGANIZATION_NAME, Tag::UTF8_STRING,
                attrs.organization
            ),
            rdn(
                &oid::AT_ORGANIZATIONAL_UNIT_NAME, Tag::UTF8_STRING,
                attrs.organizational_unit
            ),
            rdn(&oid::AT_COMMON_NAME, Tag::UTF8_STRING, attrs.common_name),
        ));
        Name(Captured::from_values(Mode::Der, values))
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.capture(|cons| {
            cons.take_sequence(|cons| { // RDNSequence
                while let Some(()) = cons.take_opt_set(|cons| {
                    let mut empty_set = true;
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        empty_set = false;
                        Oid::skip_in(cons)?;
                        if cons.skip_one()?.is_none() {
                            return Err(cons.content_err("invalid name"))
                        }
                        Ok(())
                    })? { }
                    if empty_set {
                        return Err(cons.content_err(
                            "empty relative distinguished name"
                        ));
                    }
                    Ok(())
                })? { }
                Ok(())
            })
        }).map(Name)
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.0
    }

    /// Returns the attribute types and string values of the name.
    ///
    /// Values that aren’t valid UTF-8 are converted lossily.
    pub fn attributes(
        &self
    ) -> Result<Vec<(Oid<Bytes>, String)>, DecodeError<Infallible>> {
        let mut res = Vec::new();
        self.0.clone().decode(|cons| {
            cons.take_sequence(|cons| {
                while let Some(()) = cons.take_opt_set(|cons| {
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        let id = Oid::take_from(cons)?;
                        let value = cons.take_value(|_, content| {
                            OctetString::from_content(content)
                        })?.to_bytes();
                        res.push((
                            id, String::from_utf8_lossy(&value).into_owned()
                        ));
                        Ok(())
                    })? { }
                    Ok(())
                })? { }
                Ok(())
            })
        })?;
        Ok(res)
    }

    /// Returns the first common name of the name if there is one.
    pub fn common_name(&self) -> Option<String> {
        self.attributes().ok()?.into_iter().find_map(|(id, value)| {
            if id == oid::AT_COMMON_NAME { Some(value) } else { None }
        })
    }
}


//--- PartialEq and Eq

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for Name {}


//--- Display

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let attrs = match self.attributes() {
            Ok(attrs) => attrs,
            Err(_) => return f.write_str("<invalid name>"),
        };
        let mut first = true;
        for (id, value) in attrs {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            let label = if id == oid::AT_COUNTRY_NAME { "C" }
                else if id == oid::AT_STATE_NAME { "ST" }
                else if id == oid::AT_LOCALITY_NAME { "L" }
                else if id == oid::AT_ORGANIZATION_NAME { "O" }
                else if id == oid::AT_ORGANIZATIONAL_UNIT_NAME { "OU" }
                else if id == oid::AT_COMMON_NAME { "CN" }
                else {
                    write!(f, "{}={}", id, value)?;
                    continue
                };
            write!(f, "{}={}", label, value)?;
        }
        Ok(())
    }
}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
//
//  We encode the serial number in 20 octets left padded.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Serial([u8; 20]);

impl Serial {
    /// Creates a serial number from the octets of an unsigned integer.
    pub fn from_slice(s: &[u8]) -> Result<Self, SerialSliceError> {
        if s.is_empty() {
            return Err(SerialSliceError("empty serial number"))
        }
        // Strip leading zeros so the sign octet doesn’t count.
        let start = s.iter().position(|&ch| ch != 0).unwrap_or(s.len() - 1);
        let s = &s[start..];
        if s.len() > 20 || (s.len() == 20 && s[0] & 0x80 != 0) {
            return Err(SerialSliceError("serial number too long"))
        }
        let mut res = [0u8; 20];
        res[20 - s.len()..].copy_from_slice(s);
        Ok(Serial(res))
    }

    /// Creates a random new serial number.
    pub fn random<S: Signer>(signer: &S) -> Result<Self, S::Error> {
        let mut res = [0u8; 20];
        signer.rand(&mut res)?;
        res[0] &= 0x7F;
        Ok(Self(res))
    }

    /// Returns the serial number as an integer if it is small enough.
    pub fn to_u64(self) -> Option<u64> {
        if self.0[..12].iter().any(|&ch| ch != 0) {
            return None
        }
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&self.0[12..]);
        Some(u64::from_be_bytes(tail))
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let value = Unsigned::take_from(cons)?;
        Self::from_slice(value.as_ref()).map_err(|err| cons.content_err(err))
    }

    /// Returns the index of the first octet to encode.
    fn start(self) -> usize {
        let start = self.0.iter().position(|&ch| ch != 0).unwrap_or(19);
        if self.0[start] & 0x80 != 0 {
            // Needs a leading zero to stay positive.
            start - 1
        }
        else {
            start
        }
    }
}


//--- From and FromStr

impl From<u64> for Serial {
    fn from(value: u64) -> Self {
        let mut res = [0u8; 20];
        res[12..].copy_from_slice(&value.to_be_bytes());
        Serial(res)
    }
}

impl FromStr for Serial {
    type Err = SerialSliceError;

    /// Parses a decimal serial number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Serial::from).map_err(|_| {
            SerialSliceError("invalid serial number")
        })
    }
}


//--- Display and Debug

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_u64() {
            Some(value) => write!(f, "{}", value),
            None => {
                f.write_str("0x")?;
                for ch in &self.0[self.start()..] {
                    write!(f, "{:02X}", ch)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serial({})", self)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for Serial {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _mode: Mode) -> usize {
        20 - self.start()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&self.0[self.start()..])
    }
}


//------------ SignedData ----------------------------------------------------

/// Some data together with its signature.
///
/// This is the outer layer of a certificate.
#[derive(Clone, Debug)]
pub struct SignedData {
    data: Captured,
    signature: Signature,
}

impl SignedData {
    pub fn new(data: Captured, signature: Signature) -> Self {
        Self { data, signature }
    }

    pub fn data(&self) -> &Captured {
        &self.data
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Ok(SignedData {
            data: cons.capture_one()?,
            signature: Signature::new(
                SignatureAlgorithm::x509_take_from(cons)?,
                BitString::take_from(cons)?.octet_bytes()
            )
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            &self.data,
            self.signature.algorithm().x509_encode(),
            SignatureValueContent(self).encode(),
        ))
    }

    pub fn verify_signature(
        &self,
        public_key: &PublicKey
    ) -> Result<(), SignatureVerificationError> {
        public_key.verify(self.data.as_ref(), &self.signature)
    }
}


//--- PartialEq and Eq

impl PartialEq for SignedData {
    fn eq(&self, other: &Self) -> bool {
        self.data.as_slice() == other.data.as_slice() &&
            self.signature == other.signature
    }
}

impl Eq for SignedData {}


#[derive(Clone, Copy, Debug)]
struct SignatureValueContent<'a>(&'a SignedData);

impl PrimitiveContent for SignatureValueContent<'_> {
    const TAG: Tag = Tag::BIT_STRING;

    fn encoded_len(&self, _: Mode) -> usize {
        self.0.signature.value().len() + 1
    }

    fn write_encoded<W: io::Write>(
        &self,
        _: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&[0u8])?;
        target.write_all(self.0.signature.value().as_ref())
    }
}


//------------ Time ----------------------------------------------------------

/// A point in time with a resolution of seconds.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(DateTime<Utc>);

impl Time {
    /// Creates a time value, dropping any fractional seconds.
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt.trunc_subsecs(0))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn utc(
        year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single()
            .map(Time)
    }

    /// Adds a duration unless the result would overflow.
    pub fn checked_add(self, delta: TimeDelta) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Time)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive(|tag, prim| {
            let year = match tag {
                // RFC 5280 requires the format YYMMDDHHMMSSZ
                Tag::UTC_TIME => {
                    let year = read_digits(prim, 2)? as i32;
                    if year >= 50 { year + 1900 } else { year + 2000 }
                }
                // RFC 5280 requires the format YYYYMMDDHHMMSSZ
                Tag::GENERALIZED_TIME => read_digits(prim, 4)? as i32,
                _ => return Err(prim.content_err("malformed time value"))
            };
            let res = (
                year,
                read_digits(prim, 2)?,
                read_digits(prim, 2)?,
                read_digits(prim, 2)?,
                read_digits(prim, 2)?,
                read_digits(prim, 2)?,
            );
            if prim.take_u8()? != b'Z' {
                return Err(prim.content_err("malformed time value"))
            }
            Self::from_parts(res).map_err(|err| prim.content_err(err))
        })
    }

    fn from_parts(
        parts: (i32, u32, u32, u32, u32, u32)
    ) -> Result<Self, ContentError> {
        Self::utc(
            parts.0, parts.1, parts.2, parts.3, parts.4, parts.5
        ).ok_or_else(|| ContentError::from_static("malformed time value"))
    }

    pub fn encode_utc_time(self) -> impl encode::Values {
        UtcTime(self).encode()
    }

    pub fn encode_generalized_time(self) -> impl encode::Values {
        GeneralizedTime(self).encode()
    }

    /// Encodes as UTCTime for 1950 through 2049, GeneralizedTime otherwise.
    pub fn encode_varied(self) -> impl encode::Values {
        if self.year() < 1950 || self.year() > 2049 {
            (None, Some(self.encode_generalized_time()))
        }
        else {
            (Some(self.encode_utc_time()), None)
        }
    }
}


//--- Deref and AsRef

impl ops::Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<DateTime<Utc>> for Time {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}


//--- From

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time::new(time)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(time: Time) -> Self {
        time.0
    }
}


//--- Display

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}


fn read_digits<S: decode::Source>(
    source: &mut S, len: usize
) -> Result<u32, DecodeError<S::Error>> {
    let mut res = 0u32;
    for _ in 0..len {
        let ch = source.take_u8()?;
        if !ch.is_ascii_digit() {
            return Err(source.content_err("malformed time value"))
        }
        res = res * 10 + u32::from(ch - b'0');
    }
    Ok(res)
}


//------------ UtcTime -------------------------------------------------------

struct UtcTime(Time);

impl PrimitiveContent for UtcTime {
    const TAG: Tag = Tag::UTC_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        13 // yyMMddhhmmssZ
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        write!(
            target, "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            self.0.year() % 100, self.0.month(), self.0.day(),
            self.0.hour(), self.0.minute(), self.0.second()
        )
    }
}


//------------ GeneralizedTime -----------------------------------------------

struct GeneralizedTime(Time);

impl PrimitiveContent for GeneralizedTime {
    const TAG: Tag = Tag::GENERALIZED_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        15 // yyyyMMddhhmmssZ
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        write!(
            target, "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            self.0.year(), self.0.month(), self.0.day(),
            self.0.hour(), self.0.minute(), self.0.second()
        )
    }
}


//------------ Validity ------------------------------------------------------

/// The validity period of a certificate.
#[derive(Clone, Debug, Copy, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    /// Creates a validity starting at `start` and lasting `secs` seconds.
    ///
    /// Returns `None` if the end of the period can’t be encoded in a
    /// certificate.
    pub fn from_secs_at(start: Time, secs: u64) -> Option<Self> {
        let delta = TimeDelta::try_seconds(i64::try_from(secs).ok()?)?;
        let not_after = start.checked_add(delta)?;
        if not_after.year() > 9999 {
            return None
        }
        Some(Validity::new(start, not_after))
    }

    /// Creates a validity starting now and lasting `secs` seconds.
    pub fn from_secs(secs: u64) -> Option<Self> {
        Self::from_secs_at(Time::now(), secs)
    }

    pub fn not_before(self) -> Time {
        self.not_before
    }

    pub fn not_after(self) -> Time {
        self.not_after
    }

    /// Returns whether `now` lies within the period, bounds included.
    pub fn contains(self, now: Time) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            ))
        })
    }

    pub fn encode(self) -> impl encode::Values {
        encode::sequence((
            self.not_before.encode_varied(),
            self.not_after.encode_varied(),
        ))
    }
}


//------------ SerialSliceError ----------------------------------------------

/// A serial number couldn’t be created from the given value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SerialSliceError(&'static str);

impl From<SerialSliceError> for ContentError {
    fn from(err: SerialSliceError) -> Self {
        ContentError::from_static(err.0)
    }
}

impl fmt::Display for SerialSliceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl error::Error for SerialSliceError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use bcder::encode::Values;
    use super::*;

    fn encode_serial(serial: Serial) -> Vec<u8> {
        serial.encode().to_captured(Mode::Der).as_slice().to_vec()
    }

    #[test]
    fn serial_encoding() {
        assert_eq!(encode_serial(Serial::from(1001)), b"\x02\x02\x03\xe9");
        assert_eq!(encode_serial(Serial::from(0)), b"\x02\x01\x00");
        assert_eq!(encode_serial(Serial::from(0x80)), b"\x02\x02\x00\x80");

        let der = encode_serial(Serial::from(u64::MAX));
        let serial = Mode::Der.decode(der.as_slice(), Serial::take_from)
            .unwrap();
        assert_eq!(serial.to_u64(), Some(u64::MAX));
        assert_eq!(format!("{}", Serial::from(1003)), "1003");
        assert_eq!(Serial::from_str("1002"), Ok(Serial::from(1002)));
        assert!(Serial::from_slice(&[]).is_err());
        assert!(Serial::from_slice(&[0xFF; 20]).is_err());
        assert!(Serial::from_slice(&[0x7F; 20]).is_ok());
    }

    #[cfg(feature = "softkeys")]
    #[test]
    fn random_serial() {
        let signer = crate::crypto::softsigner::OpenSslSigner::new();
        let one = Serial::random(&signer).unwrap();
        assert_ne!(one, Serial::random(&signer).unwrap());
        let der = encode_serial(one);
        assert_eq!(
            Mode::Der.decode(der.as_slice(), Serial::take_from).unwrap(), one
        );
    }

    #[test]
    fn name_from_attributes() {
        let name = Name::from_attributes(NameAttributes {
            country: "US",
            organization: "Test Org",
            common_name: "device-01",
            ..Default::default()
        });
        assert_eq!(name.common_name().as_deref(), Some("device-01"));
        assert_eq!(format!("{}", name), "C=US, O=Test Org, CN=device-01");

        let der = name.encode_ref().to_captured(Mode::Der);
        let decoded = Mode::Der.decode(der.as_slice(), Name::take_from)
            .unwrap();
        assert_eq!(decoded, name);

        let other = Name::from_attributes(NameAttributes {
            common_name: "device-01",
            ..Default::default()
        });
        assert_ne!(other, name);
    }

    #[test]
    fn time_encoding() {
        fn round_trip(time: Time) -> (Vec<u8>, Time) {
            let der = time.encode_varied().to_captured(Mode::Der);
            let decoded = Mode::Der.decode(der.as_slice(), Time::take_from)
                .unwrap();
            (der.as_slice().to_vec(), decoded)
        }

        let time = Time::utc(2024, 3, 1, 12, 30, 5).unwrap();
        let (der, decoded) = round_trip(time);
        assert_eq!(der, b"\x17\x0d240301123005Z");
        assert_eq!(decoded, time);

        let time = Time::utc(2050, 1, 1, 0, 0, 0).unwrap();
        let (der, decoded) = round_trip(time);
        assert_eq!(der, b"\x18\x0f20500101000000Z");
        assert_eq!(decoded, time);
    }

    #[test]
    fn validity_window() {
        let start = Time::utc(2024, 1, 1, 0, 0, 0).unwrap();
        let validity = Validity::from_secs_at(start, 3600).unwrap();
        assert_eq!(
            validity.not_after(), Time::utc(2024, 1, 1, 1, 0, 0).unwrap()
        );
        assert!(validity.contains(start));
        assert!(validity.contains(validity.not_after()));
        assert!(!validity.contains(Time::utc(2024, 1, 1, 1, 0, 1).unwrap()));
        assert!(!validity.contains(Time::utc(2023, 12, 31, 23, 59, 59).unwrap()));
        assert!(Validity::from_secs_at(start, u64::MAX).is_none());
    }
}
