//! EDC and P/Q parity primitives over CD sector geometry.

use crate::cdrom::ECC_Q_OFFSET;
use crc::{Crc, CRC_32_CD_ROM_EDC};

// The sector EDC folds with 0xD8018001, which is the catalogued
// CRC-32/CD-ROM-EDC (0x8001801B reflected, zero init, zero xorout). The
// check constant for "123456789" is 0x6EC2EDC4.
pub(crate) static EDC: Crc<u32> = Crc::<u32>::new(&CRC_32_CD_ROM_EDC);

// GF(2^8) multiply-forward and inverse-backward tables over the 0x11D
// primitive polynomial, built once at compile time.
const fn gf8_tables() -> ([u8; 256], [u8; 256]) {
    let mut f = [0u8; 256];
    let mut b = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let j = (i << 1) ^ if i & 0x80 != 0 { 0x11d } else { 0 };
        f[i] = j as u8;
        b[i ^ j] = i as u8;
        i += 1;
    }
    (f, b)
}

const GF8_TABLES: ([u8; 256], [u8; 256]) = gf8_tables();
const ECC_F_LUT: [u8; 256] = GF8_TABLES.0;
const ECC_B_LUT: [u8; 256] = GF8_TABLES.1;

/// The ECC address for Mode 2 sectors, whose header takes no part in parity.
pub(crate) const ZERO_ADDRESS: [u8; 4] = [0; 4];

/// Walk parameters selecting one plane of the product code.
struct PqPlane {
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
}

const P_PLANE: PqPlane = PqPlane {
    major_count: 86,
    minor_count: 24,
    major_mult: 2,
    minor_inc: 86,
};

const Q_PLANE: PqPlane = PqPlane {
    major_count: 52,
    minor_count: 43,
    major_mult: 86,
    minor_inc: 88,
};

// Walks one plane of the rectangular interleave. Indices 0..4 address the
// 4-byte sector header, everything above reads `data[index - 4]`. Emits the
// two parity bytes per major column into `out`.
fn ecc_compute_pq(address: &[u8; 4], data: &[u8], plane: &PqPlane, out: &mut [u8]) {
    let size = plane.major_count * plane.minor_count;
    for major in 0..plane.major_count {
        let mut index = (major >> 1) * plane.major_mult + (major & 1);
        let mut ecc_a: u8 = 0;
        let mut ecc_b: u8 = 0;
        for _ in 0..plane.minor_count {
            let temp = if index < 4 {
                address[index]
            } else {
                data[index - 4]
            };
            index += plane.minor_inc;
            if index >= size {
                index -= size;
            }
            ecc_a ^= temp;
            ecc_b ^= temp;
            ecc_a = ECC_F_LUT[ecc_a as usize];
        }
        ecc_a = ECC_B_LUT[(ECC_F_LUT[ecc_a as usize] ^ ecc_b) as usize];
        out[major] = ecc_a;
        out[major + plane.major_count] = ecc_a ^ ecc_b;
    }
}

fn ecc_check_pq(address: &[u8; 4], data: &[u8], plane: &PqPlane, ecc: &[u8]) -> bool {
    let mut scratch = [0u8; 172];
    let len = plane.major_count * 2;
    ecc_compute_pq(address, data, plane, &mut scratch[..len]);
    scratch[..len] == ecc[..len]
}

/// Verify both parity planes of a sector against the stored ECC block.
pub(crate) fn ecc_check_sector(address: &[u8; 4], data: &[u8], ecc: &[u8]) -> bool {
    ecc_check_pq(address, data, &P_PLANE, ecc)
        && ecc_check_pq(address, data, &Q_PLANE, &ecc[ECC_Q_OFFSET..])
}

/// Write both parity planes of a sector into the ECC block.
pub(crate) fn ecc_write_sector(address: &[u8; 4], data: &[u8], ecc: &mut [u8]) {
    ecc_compute_pq(address, data, &P_PLANE, ecc);
    ecc_compute_pq(address, data, &Q_PLANE, &mut ecc[ECC_Q_OFFSET..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdrom::ECC_SIZE;

    #[test]
    fn edc_matches_cdrom_polynomial() {
        assert_eq!(EDC.checksum(b"123456789"), 0x6ec2edc4);
        assert_eq!(EDC.checksum(&[]), 0);
    }

    #[test]
    fn edc_digest_matches_one_shot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut digest = EDC.digest();
        for chunk in data.chunks(100) {
            digest.update(chunk);
        }
        assert_eq!(digest.finalize(), EDC.checksum(&data));
    }

    #[test]
    fn gf8_tables_are_inverse() {
        assert_eq!(ECC_F_LUT[0], 0);
        assert_eq!(ECC_F_LUT[1], 2);
        assert_eq!(ECC_F_LUT[0x80], 0x1d);
        for i in 0..256usize {
            let j = ECC_F_LUT[i] as usize;
            assert_eq!(ECC_B_LUT[i ^ j], i as u8);
        }
    }

    #[test]
    fn parity_write_then_check() {
        let mut data = [0u8; 2336];
        let mut x: u32 = 0x2545f491;
        for b in data.iter_mut() {
            x = x.wrapping_mul(1103515245).wrapping_add(12345);
            *b = (x >> 16) as u8;
        }
        let address = [0x00, 0x02, 0x16, 0x01];

        let mut ecc = [0u8; ECC_SIZE];
        ecc_write_sector(&address, &data, &mut ecc);
        assert!(ecc_check_sector(&address, &data, &ecc));

        // any single-byte corruption must be caught by one of the planes
        ecc[0] ^= 0x40;
        assert!(!ecc_check_sector(&address, &data, &ecc));
        ecc[0] ^= 0x40;
        data[100] ^= 0x01;
        assert!(!ecc_check_sector(&address, &data, &ecc));
        data[100] ^= 0x01;
        assert!(!ecc_check_sector(&ZERO_ADDRESS, &data, &ecc));
    }
}
