use classical_breaker::{
    Error, LanguageModel, ModelOptions,
    attack::{HillConfig, HillRanking, HillSearch},
    cipher::{HillKey, SubstitutionKey, VigenereKey},
    known,
    modular::Matrix,
    text,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const HILL_CIPHER: &str = "dzvzkwwutatrkwhapdvqdeuqsadqacnnxegwwusaautahejeqlpvdfrldlbnuejefileheoqidkuacnnxekunfnagiyetvvgoqxdkubfkqqlausaddsilrdz";

const MONO_PLAIN: &str = "manhaocaboalmeidaperguntaoqueelesestaofazendoaliaaquelahoraasarmasestaoapontadasparaelesenquantoestaocomasmaosnacabecaoc";
const MONO_CIPHER: &str = "cbetbvrbzvbdcimpbwiygfejbvsfiidikikjbvnbuiepvbdmbbsfidbtvybbkbycbkikjbvbwvejbpbkwbybidikiesfbejvikjbvrvcbkcbvkebrbzirbvr";

fn bakery_model() -> LanguageModel {
    let corpus = "a idade mas tambem ha arte jose sabe quando massa esta no ponto pelo tato nao por \
                  cronometros o sol nasce os primeiros clientes sao recebidos casa cidade tempo vida \
                  dia noite agua pao forno padeiro manha cedo";
    LanguageModel::from_corpus(corpus.split_whitespace(), &ModelOptions::default()).unwrap()
}

#[test]
fn hill_two_by_two_ciphertext_only() {
    let model = bakery_model();
    let cipher = text::to_letters(HILL_CIPHER);
    let results = HillSearch::new(&model, HillConfig::new(2)).run(&cipher).unwrap();

    assert_eq!(results.len(), 5);
    let best = &results[0];
    assert!(best.coverage > 0.5);
    assert_eq!(best.key.matrix(), &Matrix::from_rows(&[[1, 7], [0, 17]]).unwrap());
    assert!(best.plaintext.starts_with("idademastambemhaarte"));
    assert!(results[1..].iter().all(|r| r.coverage < best.coverage));
}

#[test]
fn hill_normalized_ranking_agrees_on_the_winner() {
    let model = bakery_model();
    let cipher = text::to_letters(HILL_CIPHER);
    let config = HillConfig {
        ranking: HillRanking::Normalized,
        ..HillConfig::new(2)
    };
    let results = HillSearch::new(&model, config).run(&cipher).unwrap();
    assert_eq!(results[0].key.matrix(), &Matrix::from_rows(&[[1, 7], [0, 17]]).unwrap());
    assert!((results[0].combined - 1.0).abs() < 1e-9);
}

#[test]
fn mono_frequency_mapping_on_aligned_texts() {
    let cipher = text::to_letters(MONO_CIPHER);
    let mapping = known::frequency_mapping(&text::to_letters(MONO_PLAIN), &cipher);
    assert_eq!(mapping.decrypt(&cipher), MONO_PLAIN);
}

#[test]
fn ciphers_round_trip_on_accented_input() {
    let plain = text::to_letters("Coração de mãe, sempre cabe mais um! Ação às 10h.");
    assert_eq!(text::from_letters(&plain), "coracaodemaesemprecabemaisumacaoash");

    let mono = SubstitutionKey::random(&mut ChaCha20Rng::seed_from_u64(11));
    assert_eq!(mono.decrypt(&mono.encrypt(&plain)), plain);

    let vigenere = VigenereKey::parse("chave").unwrap();
    assert_eq!(vigenere.decrypt(&vigenere.encrypt(&plain)), plain);

    let hill = HillKey::new(Matrix::from_rows(&[[15, 25, 5], [0, 25, 11], [0, 0, 3]]).unwrap()).unwrap();
    let round = hill.decrypt(&hill.encrypt(&plain));
    assert_eq!(&round[..plain.len()], &plain[..]);
}

#[test]
fn hill_pads_partial_blocks_with_zeros() {
    let hill = HillKey::new(Matrix::from_rows(&[[3, 3], [2, 5]]).unwrap()).unwrap();
    let plain = text::to_letters("sol");
    let cipher = hill.encrypt(&plain);
    assert_eq!(cipher.len(), 4);

    let decrypted = hill.decrypt(&cipher);
    assert_eq!(decrypted.len(), 4);
    assert_eq!(text::from_letters(&decrypted), "sola");
}

#[test]
fn known_plaintext_recovers_hill_and_vigenere_keys() {
    let plain = text::to_letters(MONO_PLAIN);

    let hill = HillKey::new(Matrix::from_rows(&[[1, 7], [0, 17]]).unwrap()).unwrap();
    let recovered = known::recover_hill_key(&plain, &hill.encrypt(&plain), 2).unwrap();
    assert_eq!(recovered.matrix(), hill.matrix());

    let vigenere = VigenereKey::parse("segredo").unwrap();
    let recovered = known::extract_vigenere_key(&plain, &vigenere.encrypt(&plain), 7).unwrap();
    assert_eq!(recovered, vigenere);
}

#[test]
fn singular_keys_are_rejected() {
    let singular = Matrix::from_rows(&[[2, 4], [1, 2]]).unwrap();
    assert!(matches!(HillKey::new(singular), Err(Error::NotInvertible { .. })));
}
