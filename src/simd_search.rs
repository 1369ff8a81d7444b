// SIMD-accelerated marker search
// First-byte filtering with AVX2/SSE2, confirmed by a slice compare

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// SIMD-accelerated pattern search with runtime dispatch
/// Returns offset of first match, or None
#[inline]
pub fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            // Safety: AVX2 support checked at runtime
            return unsafe { find_pattern_avx2(haystack, needle) };
        }
        // Safety: SSE2 is part of the x86_64 baseline
        return unsafe { find_pattern_sse2(haystack, needle) };
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        return find_pattern_scalar(haystack, needle);
    }
}

/// Search starting at `from`, returning an absolute position
#[inline]
pub fn find_pattern_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    find_pattern(&haystack[from..], needle).map(|pos| from + pos)
}

/// Scalar pattern search (fallback and tail handling)
#[inline]
fn find_pattern_scalar(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// AVX2 first-byte filter, 32 candidate positions per step
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn find_pattern_avx2(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let needle_len = needle.len();
    let first_byte_vec = _mm256_set1_epi8(needle[0] as i8);
    // number of valid start positions
    let starts = haystack.len() - needle_len + 1;

    let mut i = 0;
    while i + 32 <= starts {
        let chunk = _mm256_loadu_si256(haystack.as_ptr().add(i) as *const __m256i);
        let mut mask = _mm256_movemask_epi8(_mm256_cmpeq_epi8(chunk, first_byte_vec)) as u32;

        while mask != 0 {
            let pos = i + mask.trailing_zeros() as usize;
            if &haystack[pos..pos + needle_len] == needle {
                return Some(pos);
            }
            mask &= mask - 1;
        }

        i += 32;
    }

    find_pattern_scalar(&haystack[i..], needle).map(|pos| i + pos)
}

/// SSE2 first-byte filter, 16 candidate positions per step
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn find_pattern_sse2(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let needle_len = needle.len();
    let first_byte_vec = _mm_set1_epi8(needle[0] as i8);
    let starts = haystack.len() - needle_len + 1;

    let mut i = 0;
    while i + 16 <= starts {
        let chunk = _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
        let mut mask = _mm_movemask_epi8(_mm_cmpeq_epi8(chunk, first_byte_vec)) as u32;

        while mask != 0 {
            let pos = i + mask.trailing_zeros() as usize;
            if &haystack[pos..pos + needle_len] == needle {
                return Some(pos);
            }
            mask &= mask - 1;
        }

        i += 16;
    }

    find_pattern_scalar(&haystack[i..], needle).map(|pos| i + pos)
}
