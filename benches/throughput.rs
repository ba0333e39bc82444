use bencher::{benchmark_group, benchmark_main, Bencher};
use ecm::sector::{detect_sector, reconstruct_sector, SectorKind};
use ecm::{Decoder, Encoder, State};
use std::io::Cursor;

const CD_SECTOR_SIZE: usize = 2352;

fn synth_image(sectors: usize) -> Vec<u8> {
    let mut image = Vec::with_capacity(sectors * CD_SECTOR_SIZE);
    let mut seed: u32 = 0x1234_5678;
    for lba in 0..sectors {
        let mut sector = [0u8; CD_SECTOR_SIZE];
        sector[0x00c] = (lba / 4500) as u8;
        sector[0x00d] = ((lba / 75) % 60) as u8;
        sector[0x00e] = (lba % 75) as u8;
        for b in sector[0x010..0x810].iter_mut() {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            *b = (seed >> 16) as u8;
        }
        reconstruct_sector(&mut sector, SectorKind::Mode1);
        image.extend_from_slice(&sector);
    }
    image
}

fn detect_bench(bench: &mut Bencher) {
    let image = synth_image(16);
    bench.iter(|| {
        let mut found = 0usize;
        for window in image.chunks_exact(CD_SECTOR_SIZE) {
            if detect_sector(window) == SectorKind::Mode1 {
                found += 1;
            }
        }
        found
    });
    bench.bytes = image.len() as u64;
}

fn roundtrip_bench(bench: &mut Bencher) {
    let image = synth_image(64);
    bench.iter(|| {
        let mut encoded = Vec::new();
        let mut encoder =
            Encoder::new(Cursor::new(&image), &mut encoded, 1 << 20).expect("encoder");
        while encoder.step().state == State::InProgress {}
        drop(encoder);

        let mut decoded = Vec::new();
        let mut decoder = Decoder::new(
            Cursor::new(&encoded),
            &mut decoded,
            1 << 20,
            Some(encoded.len() as u64),
        )
        .expect("decoder");
        while decoder.step().state == State::InProgress {}
        drop(decoder);
        decoded.len()
    });
    bench.bytes = image.len() as u64;
}

benchmark_group!(benches, detect_bench, roundtrip_bench);
benchmark_main!(benches);
