//! GPS coordinates embedded in downloaded images
//!
//! Used when the photo page itself carries no coordinates. Only the primary
//! image's GPS block is read; anything unreadable means "no coordinates".

use exif::{Exif, In, Reader, Tag, Value};
use std::io::Cursor;
use tracing::debug;

/// `(latitude, longitude)` in signed decimal degrees, if the image has a
/// usable GPS position.
pub fn gps_coordinates(bytes: &[u8]) -> Option<(f64, f64)> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF data: {}", e);
            return None;
        }
    };

    let latitude = signed_degrees(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = signed_degrees(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;

    let in_range = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
    let unset = latitude == 0.0 && longitude == 0.0;
    (in_range && !unset).then_some((latitude, longitude))
}

/// Degrees + minutes/60 + seconds/3600, negated for the southern or western
/// hemisphere.
fn signed_degrees(exif: &Exif, value_tag: Tag, reference_tag: Tag, negative: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    let [degrees, minutes, seconds] = parts.get(..3)? else {
        return None;
    };
    if [degrees, minutes, seconds].iter().any(|part| part.denom == 0) {
        return None;
    }
    let magnitude = degrees.to_f64() + minutes.to_f64() / 60.0 + seconds.to_f64() / 3600.0;

    let hemisphere = exif
        .get_field(reference_tag, In::PRIMARY)
        .and_then(|field| match &field.value {
            Value::Ascii(values) => values.first().and_then(|value| value.first()).copied(),
            _ => None,
        });
    Some(if hemisphere.map(|h| h.to_ascii_uppercase()) == Some(negative) {
        -magnitude
    } else {
        magnitude
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type Dms = [(u32, u32); 3];

    /// Minimal big-endian JPEG whose only content is a GPS block.
    fn jpeg_with_gps(latitude: Dms, latitude_ref: u8, longitude: Dms, longitude_ref: u8) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a");
        tiff.extend_from_slice(&8u32.to_be_bytes());
        // IFD0: GPS pointer only
        tiff.extend_from_slice(&1u16.to_be_bytes());
        entry(&mut tiff, 0x8825, 4, 1, 26u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        // GPS IFD at 26, rationals at 80 and 104
        tiff.extend_from_slice(&4u16.to_be_bytes());
        entry(&mut tiff, 0x0001, 2, 2, [latitude_ref, 0, 0, 0]);
        entry(&mut tiff, 0x0002, 5, 3, 80u32.to_be_bytes());
        entry(&mut tiff, 0x0003, 2, 2, [longitude_ref, 0, 0, 0]);
        entry(&mut tiff, 0x0004, 5, 3, 104u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        for (numerator, denominator) in latitude.iter().chain(longitude.iter()) {
            tiff.extend_from_slice(&numerator.to_be_bytes());
            tiff.extend_from_slice(&denominator.to_be_bytes());
        }

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    fn entry(tiff: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        tiff.extend_from_slice(&tag.to_be_bytes());
        tiff.extend_from_slice(&kind.to_be_bytes());
        tiff.extend_from_slice(&count.to_be_bytes());
        tiff.extend_from_slice(&value);
    }

    #[test]
    fn test_west_longitude_is_negative() {
        let jpeg = jpeg_with_gps([(45, 1), (30, 1), (0, 1)], b'N', [(73, 1), (33, 1), (36, 1)], b'W');
        let (latitude, longitude) = gps_coordinates(&jpeg).unwrap();
        assert!((latitude - 45.5).abs() < 1e-9);
        assert!((longitude + 73.56).abs() < 1e-9);
    }

    #[test]
    fn test_southern_hemisphere() {
        let jpeg = jpeg_with_gps([(33, 1), (5140, 100), (0, 1)], b'S', [(151, 1), (12, 1), (0, 1)], b'E');
        let (latitude, longitude) = gps_coordinates(&jpeg).unwrap();
        assert!((latitude + 33.856_666_666).abs() < 1e-6);
        assert!((longitude - 151.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_position_is_ignored() {
        let zero = [(0, 1), (0, 1), (0, 1)];
        assert_eq!(gps_coordinates(&jpeg_with_gps(zero, b'N', zero, b'E')), None);
    }

    #[test]
    fn test_image_without_exif() {
        assert_eq!(gps_coordinates(b"\xFF\xD8\xFF\xD9"), None);
        assert_eq!(gps_coordinates(b"not an image"), None);
    }
}
