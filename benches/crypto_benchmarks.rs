use criterion::{Criterion, black_box, criterion_group, criterion_main};
use hap_server::protocol::crypto::{SrpClient, SrpParams, SrpServer};
use hap_server::protocol::pairing::tlv::{TlvEncoder, TlvType};

fn srp_handshake_benchmark(c: &mut Criterion) {
    let username = b"Pair-Setup";
    let password = b"111-11-111";
    let salt = b"0123456789abcdef";
    let verifier = SrpServer::compute_verifier(username, password, salt, &SrpParams::RFC5054_3072);

    c.bench_function("srp_client_new", |b| {
        b.iter(|| SrpClient::new(black_box(&SrpParams::RFC5054_3072)).unwrap());
    });

    c.bench_function("srp_server_process_challenge_round_trip", |b| {
        b.iter(|| {
            let client = SrpClient::new(&SrpParams::RFC5054_3072).unwrap();
            let server = SrpServer::new(&verifier, &SrpParams::RFC5054_3072);
            let client_verifier = client
                .process_challenge(username, password, salt, server.public_key())
                .unwrap();
            let (session_key, server_proof) = server
                .verify_client(username, salt, client.public_key(), client_verifier.client_proof())
                .unwrap();
            let client_key = client_verifier.verify_server(&server_proof).unwrap();
            black_box((session_key, client_key));
        });
    });
}

fn tlv_encode_benchmark(c: &mut Criterion) {
    let public_key = [0xAAu8; 32];
    let signature = [0xBBu8; 64];

    c.bench_function("tlv_encode_pair_setup_m5_inner", |b| {
        b.iter(|| {
            TlvEncoder::new()
                .add(TlvType::Identifier, black_box(b"AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE"))
                .add(TlvType::PublicKey, black_box(&public_key))
                .add(TlvType::Signature, black_box(&signature))
                .build()
        });
    });
}

criterion_group!(benches, srp_handshake_benchmark, tlv_encode_benchmark);
criterion_main!(benches);
