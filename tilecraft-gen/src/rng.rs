//! Seeded PRNG and value noise
//!
//! Everything random in a generation run is derived from strings: the
//! reference seed plus a context suffix (`seed|layer|hills`, `seed|chance|…`).
//! The generator is not cryptographic, only reproducible.

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over the UTF-8 bytes of `s`.
pub fn fnv1a(s: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for &b in s.as_bytes() {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic stream of floats in `[0, 1)` seeded from a string.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: &str) -> Self {
        let hash = fnv1a(seed);
        // xorshift never leaves zero
        let state = if hash == 0 { 0x9e37_79b9 } else { hash };
        Self { state }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Next float in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }

    /// Uniform integer in `0..n`. `n` must be non-zero.
    #[inline]
    pub fn below(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n - 1)
    }
}

/// First draw of a fresh stream: a pure function of `key`.
pub fn hash_unit(key: &str) -> f64 {
    Rng::new(key).next_f64()
}

/// 2D value noise over a shuffled 256-entry lattice, output in `[0, 1]`.
pub struct ValueNoise {
    perm: [u8; 512],
}

impl ValueNoise {
    pub fn new(rng: &mut Rng) -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }

        // Fisher-Yates
        for i in (1..256).rev() {
            let j = rng.below(i + 1);
            table.swap(i, j);
        }

        // Doubled so perm[perm[x] + y] never wraps
        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&table);
        perm[256..].copy_from_slice(&table);

        Self { perm }
    }

    #[inline(always)]
    fn corner(&self, xi: i64, yi: i64) -> f64 {
        let x = (xi & 0xFF) as usize;
        let y = (yi & 0xFF) as usize;
        self.perm[self.perm[x] as usize + y] as f64 / 255.0
    }

    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let (xi, yi) = (x0 as i64, y0 as i64);
        let u = fade(x - x0);
        let v = fade(y - y0);

        let v00 = self.corner(xi, yi);
        let v10 = self.corner(xi + 1, yi);
        let v01 = self.corner(xi, yi + 1);
        let v11 = self.corner(xi + 1, yi + 1);

        let top = lerp(v00, v10, u);
        let bottom = lerp(v01, v11, u);
        lerp(top, bottom, v).clamp(0.0, 1.0)
    }

    /// Fractal sum of `octaves` layers, normalized by total amplitude.
    pub fn octaves(&self, x: f64, y: f64, octaves: u32, persistence: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut norm = 0.0;

        for _ in 0..octaves {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            norm += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        if norm > 0.0 { (total / norm).clamp(0.0, 1.0) } else { 0.0 }
    }
}

/// 6t^5 - 15t^4 + 10t^3
#[inline(always)]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline(always)]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_reproducible() {
        let mut a = Rng::new("meadow");
        let mut b = Rng::new("meadow");
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        let mut c = Rng::new("meadow2");
        let mut a = Rng::new("meadow");
        let same = (0..16).filter(|_| a.next_u32() == c.next_u32()).count();
        assert!(same < 16);
    }

    #[test]
    fn test_rng_range() {
        let mut rng = Rng::new("");
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
        for _ in 0..1000 {
            assert!(rng.below(7) < 7);
        }
    }

    #[test]
    fn test_permutation_is_complete() {
        let noise = ValueNoise::new(&mut Rng::new("perm"));
        let mut seen = [false; 256];
        for &p in &noise.perm[..256] {
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(noise.perm[..256], noise.perm[256..]);
    }

    #[test]
    fn test_noise_matches_lattice() {
        let noise = ValueNoise::new(&mut Rng::new("lattice"));
        // At integer points the fade weight is zero
        assert_eq!(noise.sample(3.0, 7.0), noise.corner(3, 7));
        assert_eq!(noise.sample(-1.0, 0.0), noise.corner(-1, 0));
    }

    #[test]
    fn test_noise_range_and_variation() {
        let noise = ValueNoise::new(&mut Rng::new("range"));
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for i in 0..2000 {
            let x = i as f64 * 0.173;
            let v = noise.sample(x, x * 0.5 - 40.0);
            assert!((0.0..=1.0).contains(&v));
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        assert!(max_v - min_v > 0.5, "noise doesn't vary enough: {} to {}", min_v, max_v);

        for i in 0..200 {
            let v = noise.octaves(i as f64 * 0.31, 2.5, 5, 0.5);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_single_octave_is_base_noise() {
        let noise = ValueNoise::new(&mut Rng::new("oct"));
        assert_eq!(noise.octaves(1.3, 2.7, 1, 0.5), noise.sample(1.3, 2.7));
    }
}
