//! Best-effort tag assembly for one encode job.

use chrono::{DateTime, Local};
use exif::{Tag, Value};

use super::convert;
use super::entries::TagEntrySet;
use crate::buffer::CaptureMetadata;
use crate::config::DeviceIdentity;
use crate::error::PostprocError;
use crate::job::EncodeSettings;
use crate::metrics;

type FieldResult = Result<Vec<(Tag, Value)>, PostprocError>;

fn ascii(text: &str) -> Value {
    Value::Ascii(vec![text.as_bytes().to_vec()])
}

/// Builds the tag entries written into each JPEG.
///
/// Every field is computed on its own: a field that cannot be computed or
/// stored is logged and skipped, and the remaining fields are still written.
#[derive(Debug, Clone)]
pub struct MetadataAssembler {
    capacity: usize,
    device: DeviceIdentity,
}

impl MetadataAssembler {
    pub fn new(capacity: usize, device: DeviceIdentity) -> Self {
        Self { capacity, device }
    }

    /// Assembles tags stamped with the current local time.
    pub fn assemble(
        &self,
        capture: Option<&CaptureMetadata>,
        settings: &EncodeSettings,
    ) -> Result<TagEntrySet, PostprocError> {
        self.assemble_at(&Local::now(), capture, settings)
    }

    /// Assembles tags stamped with `now`.
    ///
    /// Fails only when the entry set itself cannot be allocated.
    pub fn assemble_at(
        &self,
        now: &DateTime<Local>,
        capture: Option<&CaptureMetadata>,
        settings: &EncodeSettings,
    ) -> Result<TagEntrySet, PostprocError> {
        let mut set = TagEntrySet::new(self.capacity)?;

        self.record(&mut set, "datetime", Ok(datetime_entries(now)));

        if let Some(capture) = capture {
            if let Some(focal) = capture.focal_length {
                self.record(
                    &mut set,
                    "focal_length",
                    convert::focal_length(focal)
                        .map(|r| vec![(Tag::FocalLength, Value::Rational(vec![r]))]),
                );
            }
            if let Some(iso) = capture.sensitivity {
                self.record(&mut set, "iso", iso_entry(iso));
            }
            if let Some(raw) = capture.exposure_time {
                self.record(
                    &mut set,
                    "exposure_time",
                    convert::exposure_time(raw)
                        .map(|r| vec![(Tag::ExposureTime, Value::Rational(vec![r]))]),
                );
            }
        }

        if let Some(method) = settings.gps_processing_method.as_deref() {
            self.record(
                &mut set,
                "gps_processing_method",
                Ok(vec![(
                    Tag::GPSProcessingMethod,
                    Value::Undefined(convert::gps_processing_method(method), 0),
                )]),
            );
        }
        if let Some(gps) = settings.gps {
            self.record(
                &mut set,
                "gps_latitude",
                convert::degrees_to_dms(gps.latitude).map(|dms| {
                    vec![
                        (Tag::GPSLatitudeRef, ascii(convert::latitude_ref(gps.latitude))),
                        (Tag::GPSLatitude, Value::Rational(dms.to_vec())),
                    ]
                }),
            );
            self.record(
                &mut set,
                "gps_longitude",
                convert::degrees_to_dms(gps.longitude).map(|dms| {
                    vec![
                        (Tag::GPSLongitudeRef, ascii(convert::longitude_ref(gps.longitude))),
                        (Tag::GPSLongitude, Value::Rational(dms.to_vec())),
                    ]
                }),
            );
            self.record(
                &mut set,
                "gps_altitude",
                convert::altitude(gps.altitude).map(|(reference, value)| {
                    vec![
                        (Tag::GPSAltitudeRef, Value::Byte(vec![reference])),
                        (Tag::GPSAltitude, Value::Rational(vec![value])),
                    ]
                }),
            );
        }
        if let Some(timestamp) = settings.gps_timestamp {
            self.record(
                &mut set,
                "gps_timestamp",
                convert::gps_timestamp(timestamp).map(|(date, time)| {
                    vec![
                        (Tag::GPSDateStamp, ascii(&date)),
                        (Tag::GPSTimeStamp, Value::Rational(time.to_vec())),
                    ]
                }),
            );
        }

        if let Some((compensation, step)) =
            capture.and_then(|c| c.exposure_compensation.zip(c.ev_step))
        {
            self.record(
                &mut set,
                "exposure_bias",
                convert::exposure_bias(compensation, step)
                    .map(|r| vec![(Tag::ExposureBiasValue, Value::SRational(vec![r]))]),
            );
        }

        self.record(&mut set, "make", Ok(vec![(Tag::Make, ascii(&self.device.make))]));
        self.record(&mut set, "model", Ok(vec![(Tag::Model, ascii(&self.device.model))]));
        self.record(
            &mut set,
            "software",
            Ok(vec![(Tag::Software, ascii(&self.device.software))]),
        );

        if let Some(description) = settings.image_description.as_deref() {
            self.record(
                &mut set,
                "image_description",
                Ok(vec![(Tag::ImageDescription, ascii(description))]),
            );
        }

        Ok(set)
    }

    fn record(&self, set: &mut TagEntrySet, field: &'static str, result: FieldResult) {
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping {} tag: {}", field, e);
                metrics::TAG_ENTRIES_FAILED.with_label_values(&[field]).inc();
                return;
            }
        };
        for (tag, value) in entries {
            if let Err(e) = set.add(tag, value) {
                tracing::warn!("Cannot add {} tag {}: {}", field, tag, e);
                metrics::TAG_ENTRIES_FAILED.with_label_values(&[field]).inc();
            }
        }
    }
}

fn datetime_entries(now: &DateTime<Local>) -> Vec<(Tag, Value)> {
    let (datetime, subsec) = convert::datetime_strings(now);
    vec![
        (Tag::DateTime, ascii(&datetime)),
        (Tag::DateTimeOriginal, ascii(&datetime)),
        (Tag::DateTimeDigitized, ascii(&datetime)),
        (Tag::SubSecTime, ascii(&subsec)),
        (Tag::SubSecTimeOriginal, ascii(&subsec)),
        (Tag::SubSecTimeDigitized, ascii(&subsec)),
    ]
}

fn iso_entry(iso: i32) -> FieldResult {
    let short = u16::try_from(iso)
        .map_err(|_| PostprocError::invalid_argument(format!("iso {} does not fit a short", iso)))?;
    Ok(vec![(Tag::PhotographicSensitivity, Value::Short(vec![short]))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RationalStep;
    use crate::job::GpsCoordinates;

    fn assembler(capacity: usize) -> MetadataAssembler {
        MetadataAssembler::new(capacity, DeviceIdentity::default())
    }

    fn full_capture() -> CaptureMetadata {
        CaptureMetadata {
            focal_length: Some(4.73),
            sensitivity: Some(400),
            exposure_time: Some(120),
            exposure_compensation: Some(2),
            ev_step: Some(RationalStep {
                numerator: 1,
                denominator: 3,
            }),
            three_a_version: None,
        }
    }

    fn full_settings() -> EncodeSettings {
        EncodeSettings {
            gps: Some(GpsCoordinates {
                latitude: 45.5,
                longitude: -122.25,
                altitude: -3.0,
            }),
            gps_timestamp: Some(0),
            gps_processing_method: Some("GPS".to_string()),
            image_description: Some("test".to_string()),
            ..EncodeSettings::new(0)
        }
    }

    #[test]
    fn test_full_set_fills_default_capacity() {
        let set = assembler(23)
            .assemble(Some(&full_capture()), &full_settings())
            .unwrap();
        assert_eq!(set.len(), 23);
        assert_eq!(
            set.tags()[..6].to_vec(),
            vec![
                Tag::DateTime,
                Tag::DateTimeOriginal,
                Tag::DateTimeDigitized,
                Tag::SubSecTime,
                Tag::SubSecTimeOriginal,
                Tag::SubSecTimeDigitized,
            ]
        );
        assert_eq!(set.tags().last(), Some(&Tag::ImageDescription));

        match set.get(Tag::GPSLongitudeRef) {
            Some(Value::Ascii(v)) => assert_eq!(v[0], b"W".to_vec()),
            other => panic!("unexpected longitude ref: {:?}", other),
        }
        match set.get(Tag::GPSAltitudeRef) {
            Some(Value::Byte(v)) => assert_eq!(v, &vec![1]),
            other => panic!("unexpected altitude ref: {:?}", other),
        }
        match set.get(Tag::PhotographicSensitivity) {
            Some(Value::Short(v)) => assert_eq!(v, &vec![400]),
            other => panic!("unexpected iso: {:?}", other),
        }
    }

    #[test]
    fn test_device_identity_always_present() {
        let set = assembler(23).assemble(None, &EncodeSettings::new(0)).unwrap();
        assert_eq!(
            set.tags(),
            vec![
                Tag::DateTime,
                Tag::DateTimeOriginal,
                Tag::DateTimeDigitized,
                Tag::SubSecTime,
                Tag::SubSecTimeOriginal,
                Tag::SubSecTimeDigitized,
                Tag::Make,
                Tag::Model,
                Tag::Software,
            ]
        );
        match set.get(Tag::Make) {
            Some(Value::Ascii(v)) => assert_eq!(v[0], b"QCOM-AA".to_vec()),
            other => panic!("unexpected make: {:?}", other),
        }
    }

    #[test]
    fn test_failed_field_does_not_stop_others() {
        let capture = CaptureMetadata {
            focal_length: Some(-2.0),
            sensitivity: Some(100_000),
            exposure_time: Some(0),
            ..Default::default()
        };
        let set = assembler(23).assemble(Some(&capture), &EncodeSettings::new(0)).unwrap();
        assert!(set.get(Tag::FocalLength).is_none());
        assert!(set.get(Tag::PhotographicSensitivity).is_none());
        match set.get(Tag::ExposureTime) {
            Some(Value::Rational(v)) => assert_eq!((v[0].num, v[0].denom), (1, 60)),
            other => panic!("unexpected exposure time: {:?}", other),
        }
        assert!(set.get(Tag::Software).is_some());
    }

    #[test]
    fn test_capacity_overflow_skips_trailing_entries() {
        let set = assembler(7).assemble(None, &EncodeSettings::new(0)).unwrap();
        assert_eq!(set.len(), 7);
        assert_eq!(set.tags().last(), Some(&Tag::Make));
        assert!(set.get(Tag::Software).is_none());
    }

    #[test]
    fn test_exposure_entries_precede_gps_and_device() {
        let set = assembler(23)
            .assemble(Some(&full_capture()), &full_settings())
            .unwrap();
        let tags = set.tags();
        let position = |tag| tags.iter().position(|t| *t == tag).unwrap();
        assert_eq!(
            position(Tag::ExposureTime),
            position(Tag::PhotographicSensitivity) + 1
        );
        assert!(position(Tag::ExposureTime) < position(Tag::GPSProcessingMethod));
        assert_eq!(position(Tag::ExposureBiasValue) + 1, position(Tag::Make));
    }

    #[test]
    fn test_capacity_cut_keeps_exposure_time() {
        let set = assembler(9)
            .assemble(Some(&full_capture()), &full_settings())
            .unwrap();
        assert_eq!(set.tags().last(), Some(&Tag::ExposureTime));
        assert!(set.get(Tag::GPSLatitude).is_none());
    }

    #[test]
    fn test_gps_processing_method_is_undefined_bytes() {
        let set = assembler(23).assemble(None, &full_settings()).unwrap();
        match set.get(Tag::GPSProcessingMethod) {
            Some(Value::Undefined(bytes, _)) => assert_eq!(bytes.as_slice(), b"ASCII\0\0\0GPS\0"),
            other => panic!("unexpected processing method: {:?}", other),
        }
    }
}
