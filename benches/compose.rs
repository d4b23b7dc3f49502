use criterion::{criterion_group, criterion_main, Criterion};
use std::io::Write;
use std::path::Path;

use mimemail::{prepare_recipient, Message, PgpOptions};

fn sample_message() -> Message {
    let mut m = Message::new();
    m.from("Alice Sender", "a@x.com");
    m.to("Bob Recipient", "b@y.com");
    m.cc("", "carol@y.com");
    m.set_subject("Benchmark");
    m.plain_text_body()
        .write_all("lorem ipsum dolor sit amet\r\n".repeat(200).as_bytes())
        .unwrap();
    let blob: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    m.add_reader("blob.bin", blob.as_slice()).unwrap();
    m.pin_boundary("bench-boundary").unwrap();
    m
}

fn bench_serialize(c: &mut Criterion) {
    let message = sample_message();
    c.bench_function("serialize_64k_attachment", |b| {
        b.iter(|| message.to_bytes().unwrap())
    });
}

fn bench_encrypt(c: &mut Criterion) {
    let key_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("recipient_public.asc");
    let armored = std::fs::read_to_string(key_path).unwrap();
    let recipient = prepare_recipient(&armored).unwrap();
    let message = sample_message();
    let options = PgpOptions::default();

    c.bench_function("encrypt_envelope_64k_attachment", |b| {
        b.iter(|| message.encrypt(&recipient, None, &options).unwrap())
    });
}

criterion_group!(benches, bench_serialize, bench_encrypt);
criterion_main!(benches);
