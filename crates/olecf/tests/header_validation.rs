use olecf::{CfbError, CompoundFile, ParseLimits, ParseOptions};

fn valid_image() -> Vec<u8> {
    let mut cfb = CompoundFile::new();
    cfb.add("hello.txt", &b"1234"[..]).expect("add");
    cfb.write().expect("write")
}

#[test]
fn empty_input_is_too_small() {
    let err = CompoundFile::parse(&[]).unwrap_err();
    assert!(matches!(err, CfbError::TooSmall { have: 0, .. }), "{err}");
}

#[test]
fn short_input_is_too_small() {
    let err = CompoundFile::parse(&[0u8; 100]).unwrap_err();
    assert!(
        matches!(
            err,
            CfbError::TooSmall {
                needed: 512,
                have: 100,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn zip_magic_is_rejected() {
    let mut buf = vec![0u8; 600];
    buf[0] = 0x50;
    buf[1] = 0x4B;
    buf[2] = 0x03;
    buf[3] = 0x04;
    let err = CompoundFile::parse(&buf).unwrap_err();
    assert!(matches!(err, CfbError::UnsupportedFormat(_)), "{err}");
    assert_eq!(
        err.to_string(),
        "unsupported format: Zip contents are not supported"
    );
}

#[test]
fn corrupt_signature_is_a_header_mismatch() {
    let mut image = valid_image();
    image[0] ^= 0xFF;
    let err = CompoundFile::parse(&image).unwrap_err();
    match err {
        CfbError::HeaderMismatch {
            field,
            expected,
            actual,
        } => {
            assert_eq!(field, "header signature");
            assert_eq!(expected, "d0cf11e0a1b11ae1");
            assert_ne!(actual, expected);
        }
        other => panic!("expected HeaderMismatch, got {other}"),
    }
}

#[test]
fn unsupported_major_version_is_rejected() {
    let mut image = valid_image();
    image[26] = 5;
    let err = CompoundFile::parse(&image).unwrap_err();
    assert!(matches!(err, CfbError::UnsupportedFormat(_)), "{err}");
    assert!(err.to_string().contains("major version"), "{err}");
}

#[test]
fn sector_shift_must_match_the_version() {
    let mut image = valid_image();
    image[30] = 0x0C; // version-4 shift on a version-3 file
    let err = CompoundFile::parse(&image).unwrap_err();
    match err {
        CfbError::HeaderMismatch { field, expected, actual } => {
            assert_eq!(field, "sector shift");
            assert_eq!(expected, "9");
            assert_eq!(actual, "12");
        }
        other => panic!("expected HeaderMismatch, got {other}"),
    }
}

#[test]
fn mini_sector_shift_is_validated() {
    let mut image = valid_image();
    image[32] = 0x07;
    let err = CompoundFile::parse(&image).unwrap_err();
    assert!(
        matches!(err, CfbError::HeaderMismatch { field: "mini sector shift", .. }),
        "{err}"
    );
}

#[test]
fn reserved_bytes_must_be_zero() {
    let mut image = valid_image();
    image[34] = 1;
    let err = CompoundFile::parse(&image).unwrap_err();
    assert!(
        matches!(err, CfbError::HeaderMismatch { field: "reserved", .. }),
        "{err}"
    );
}

#[test]
fn version3_directory_sector_count_must_be_zero() {
    let mut image = valid_image();
    image[40] = 1;
    let err = CompoundFile::parse(&image).unwrap_err();
    assert!(
        matches!(
            err,
            CfbError::HeaderMismatch {
                field: "directory sector count",
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn mini_stream_cutoff_is_validated() {
    let mut image = valid_image();
    image[56] = 0x01;
    let err = CompoundFile::parse(&image).unwrap_err();
    assert!(
        matches!(err, CfbError::HeaderMismatch { field: "mini stream cutoff", .. }),
        "{err}"
    );
}

#[test]
fn sector_limit_rejects_before_materializing() {
    let image = valid_image();
    let options = ParseOptions {
        limits: ParseLimits {
            max_sectors: Some(2),
        },
    };
    let err = CompoundFile::parse_with_options(&image, &options).unwrap_err();
    assert!(matches!(err, CfbError::ChainMalformed(_)), "{err}");
    assert!(err.to_string().contains("configured limit"), "{err}");

    // The default limit admits ordinary files.
    CompoundFile::parse_with_options(&image, &ParseOptions::default()).expect("parse");
}

#[test]
fn truncated_directory_chain_is_malformed() {
    let image = valid_image();
    // Keep the header but drop every sector.
    let err = CompoundFile::parse(&image[..512]).unwrap_err();
    assert!(matches!(err, CfbError::ChainMalformed(_)), "{err}");
}
