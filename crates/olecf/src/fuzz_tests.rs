use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::CompoundFile;

fn next_u64(state: &mut u64) -> u64 {
    // Deterministic LCG (PCG32 multiplier/increment without the output
    // permutation).
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn valid_image() -> Vec<u8> {
    let mut cfb = CompoundFile::new();
    cfb.add("small.bin", &b"0123456789"[..]).expect("add small");
    cfb.add("large.bin", vec![0x21u8; 5000]).expect("add large");
    cfb.write().expect("write image")
}

#[test]
fn parse_is_panic_free_on_pseudorandom_inputs() {
    let mut state = 0x0123_4567_89ab_cdef_u64;

    for _ in 0..512 {
        let len = (next_u64(&mut state) as usize) % 4096;
        let mut buf = vec![0u8; len];
        for b in &mut buf {
            *b = (next_u64(&mut state) >> 56) as u8;
        }

        assert!(
            catch_unwind(AssertUnwindSafe(|| {
                let _ = CompoundFile::parse(&buf);
            }))
            .is_ok(),
            "parse panicked on pseudorandom input of len={len}"
        );
    }
}

#[test]
fn parse_is_panic_free_on_corrupted_images() {
    let image = valid_image();
    let mut state = 0xfeed_face_cafe_beef_u64;

    // Single-byte corruptions at pseudorandom offsets.
    for _ in 0..512 {
        let mut corrupt = image.clone();
        let off = (next_u64(&mut state) as usize) % corrupt.len();
        corrupt[off] ^= (next_u64(&mut state) >> 56).max(1) as u8;

        assert!(
            catch_unwind(AssertUnwindSafe(|| {
                let _ = CompoundFile::parse(&corrupt);
            }))
            .is_ok(),
            "parse panicked with byte {off} corrupted"
        );
    }

    // Truncations at every sector boundary and a sweep of odd lengths.
    let mut cuts: Vec<usize> = (0..image.len()).step_by(512).collect();
    cuts.extend((0..image.len()).step_by(97));
    for cut in cuts {
        let truncated = &image[..cut];
        assert!(
            catch_unwind(AssertUnwindSafe(|| {
                let _ = CompoundFile::parse(truncated);
            }))
            .is_ok(),
            "parse panicked on truncation to {cut} bytes"
        );
    }
}
