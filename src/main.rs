use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    time::Duration,
};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use classical_breaker::{
    LanguageModel, LetterSource, ModelOptions,
    attack::{
        HillConfig, HillRanking, HillSearch, SubstitutionConfig, SubstitutionSearch, VigenereConfig,
        VigenereSearch,
    },
    cipher::{HillKey, VigenereKey},
    known, text,
};
use color_eyre::eyre::{Result, WrapErr, ensure, eyre};
use log::LevelFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.command {
        Command::Hill {
            input,
            dimension,
            max_c,
            max_ab,
            top,
            ranking,
            reject_triples,
            key,
            timeout,
        } => {
            let cipher = input.letters()?;
            let model = args.load_model()?;
            let key = key.as_deref().map(HillKey::parse).transpose()?;
            let config = HillConfig {
                max_c: *max_c,
                max_ab: *max_ab,
                top_k: *top,
                ranking: (*ranking).into(),
                reject_triple_letters: *reject_triples,
                timeout: timeout.map(Duration::from_secs),
                ..HillConfig::new(*dimension)
            };
            let search = HillSearch::new(&model, config);
            let results = match key {
                Some(key) => vec![search.evaluate(&cipher, key)?],
                None => search.run(&cipher)?,
            };
            for (place, candidate) in results.iter().enumerate() {
                println!(
                    "#{} coverage {:.3}  chi² {:.2}  score {:.3}",
                    place + 1,
                    candidate.coverage,
                    candidate.chi_squared,
                    candidate.combined
                );
                println!("{}", candidate.key);
                println!("{}\n", candidate.plaintext);
            }
        }
        Command::Mono {
            input,
            population,
            generations,
            climb,
            seed,
            timeout,
        } => {
            let cipher = input.letters()?;
            let model = args.load_model()?;
            let config = SubstitutionConfig {
                population: *population,
                generations: *generations,
                climb_iterations: *climb,
                seed: *seed,
                timeout: timeout.map(Duration::from_secs),
                ..SubstitutionConfig::default()
            };
            let outcome = SubstitutionSearch::new(&model, config).run(&cipher)?;
            println!("{}", outcome.best.plaintext);
            println!("\nSubstitution table (cipher -> plain):");
            for (index, &plain) in outcome.best.key.mapping().iter().enumerate() {
                println!("{} -> {}", (b'a' + index as u8) as char, (b'a' + plain) as char);
            }
            println!(
                "\nscore {:.2}  coverage {:.3}",
                outcome.best.combined, outcome.best.coverage
            );
        }
        Command::Vigenere {
            input,
            key_length,
            key,
            positions,
            restarts,
            window,
            pairs,
            seed,
            timeout,
        } => {
            let cipher = input.letters()?;
            let model = args.load_model()?;
            let start = key.as_deref().map(VigenereKey::parse).transpose()?;
            let key_length = match (&start, key_length) {
                (Some(start), _) => start.len(),
                (None, Some(length)) => *length,
                (None, None) => return Err(eyre!("either --key-length or --key is required")),
            };
            let config = VigenereConfig {
                restarts: *restarts,
                window: (*window > 0).then_some(*window),
                pair_refinement: *pairs,
                seed: *seed,
                timeout: timeout.map(Duration::from_secs),
                ..VigenereConfig::new(key_length)
            };
            let search = VigenereSearch::new(&model, config);
            let outcome = match &start {
                Some(start) => search.refine(&cipher, start, positions)?,
                None => search.run(&cipher)?,
            };
            println!("key: {}", outcome.best.key);
            println!("{}", outcome.best.plaintext);
            println!(
                "\nscore {:.2}  coverage {:.3}",
                outcome.best.combined, outcome.best.coverage
            );
        }
        Command::Known {
            cipher_kind,
            plain,
            cipher,
            size,
        } => {
            let plain = require_letters(plain, "plaintext")?;
            let cipher = require_letters(cipher, "ciphertext")?;
            match cipher_kind {
                KnownCipher::Mono => {
                    let mapping = known::frequency_mapping(&plain, &cipher);
                    println!("{}", mapping.decrypt(&cipher));
                    println!("\nSubstitution table (cipher -> plain):");
                    print!("{mapping}");
                }
                KnownCipher::Vigenere => {
                    let key = known::extract_vigenere_key(&plain, &cipher, *size)?;
                    println!("key: {key}");
                    println!("{}", text::from_letters(&key.decrypt(&cipher)));
                }
                KnownCipher::Hill => {
                    let key = known::recover_hill_key(&plain, &cipher, *size)?;
                    println!("{key}");
                    println!("{}", text::from_letters(&key.decrypt(&cipher)));
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Ciphertext-only breaker for Hill, substitution and Vigenère ciphers")]
struct Args {
    /// Line-delimited Portuguese word list for n-grams and the dictionary
    #[arg(long, global = true, default_value = "floresta_words.txt")]
    corpus: PathBuf,

    /// Take expected letter frequencies from the corpus instead of the reference table
    #[arg(long, global = true)]
    corpus_letters: bool,

    /// Shortest corpus word kept in the dictionary
    #[arg(long, global = true, default_value_t = 3)]
    min_word_len: usize,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG still applies
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn load_model(&self) -> Result<LanguageModel> {
        let words = LanguageModel::read_word_list(&self.corpus)
            .wrap_err_with(|| format!("failed to load corpus {:?}", self.corpus))?;
        let options = ModelOptions {
            letter_source: if self.corpus_letters {
                LetterSource::Corpus
            } else {
                LetterSource::Reference
            },
            min_word_len: self.min_word_len,
        };
        Ok(LanguageModel::from_corpus(words, &options)?)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search upper-triangular Hill keys
    Hill {
        #[command(flatten)]
        input: Input,

        /// Block size of the key matrix
        #[arg(short = 'n', long, default_value_t = 3)]
        dimension: usize,

        /// Last-row candidates kept after phase 1
        #[arg(long, default_value_t = 10)]
        max_c: usize,

        /// Row candidates kept per partial key in phase 2
        #[arg(long, default_value_t = 20)]
        max_ab: usize,

        /// Number of ranked candidates to print
        #[arg(short, long, default_value_t = 5)]
        top: usize,

        #[arg(long, value_enum, default_value_t = Ranking::Coverage)]
        ranking: Ranking,

        /// Discard decryptions containing a letter tripled in a row
        #[arg(long)]
        reject_triples: bool,

        /// Score this key instead of searching, rows separated by ';' (e.g. "1,7;0,17")
        #[arg(long)]
        key: Option<String>,

        /// Stop after this many seconds and rank what was scored
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Break a monoalphabetic substitution with a genetic algorithm and hill-climbing
    Mono {
        #[command(flatten)]
        input: Input,

        #[arg(short, long, default_value_t = 100)]
        population: usize,

        #[arg(short, long, default_value_t = 300)]
        generations: usize,

        /// Hill-climbing swap proposals after the genetic stage
        #[arg(long, default_value_t = 5000)]
        climb: usize,

        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Break a Vigenère cipher of known key length
    Vigenere {
        #[command(flatten)]
        input: Input,

        #[arg(short, long, required_unless_present = "key")]
        key_length: Option<usize>,

        /// Refine this key instead of searching from scratch
        #[arg(long)]
        key: Option<String>,

        /// Key positions searched jointly when refining; every single letter and
        /// every pair when omitted
        #[arg(long, value_delimiter = ',', requires = "key")]
        positions: Vec<usize>,

        /// Number of hill-climbing restarts (default 1.5 per key letter)
        #[arg(short, long)]
        restarts: Option<usize>,

        /// Width of the exhaustive sliding-window pass; 0 disables it
        #[arg(short, long, default_value_t = 3)]
        window: usize,

        /// Also try every letter pair at every pair of positions
        #[arg(long)]
        pairs: bool,

        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Recover a key from aligned plaintext and ciphertext
    Known {
        #[arg(value_enum)]
        cipher_kind: KnownCipher,

        #[arg(short, long)]
        plain: String,

        #[arg(short, long)]
        cipher: String,

        /// Key length (Vigenère) or block size (Hill)
        #[arg(short = 'n', long, default_value_t = 2)]
        size: usize,
    },
}

#[derive(clap::Args, Debug)]
struct Input {
    /// Optional path to a file that contains the input text
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Text passed directly on the command line
    text: Option<String>,
}

impl Input {
    fn read(&self) -> Result<String> {
        if let Some(path) = &self.file {
            return fs::read_to_string(path).wrap_err_with(|| format!("failed to read {:?}", path));
        }

        if let Some(text) = &self.text {
            return Ok(text.clone());
        }

        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .wrap_err("failed to read input from stdin")?;
        Ok(buffer)
    }

    fn letters(&self) -> Result<Vec<u8>> {
        require_letters(&self.read()?, "input")
    }
}

fn require_letters(raw: &str, label: &str) -> Result<Vec<u8>> {
    let letters = text::to_letters(raw);
    ensure!(!letters.is_empty(), "{label} contains no letters");
    Ok(letters)
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Ranking {
    /// Dictionary coverage first, chi-squared as tie-break
    Coverage,
    /// Batch-normalized coverage minus chi-squared
    Normalized,
}

impl From<Ranking> for HillRanking {
    fn from(ranking: Ranking) -> Self {
        match ranking {
            Ranking::Coverage => HillRanking::WordCoverage,
            Ranking::Normalized => HillRanking::Normalized,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KnownCipher {
    Mono,
    Vigenere,
    Hill,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_errors_name_their_source() {
        let input = Input {
            file: None,
            text: Some("42 !?".into()),
        };
        assert_eq!(input.letters().unwrap_err().to_string(), "input contains no letters");
        assert_eq!(
            require_letters("", "plaintext").unwrap_err().to_string(),
            "plaintext contains no letters"
        );
        assert_eq!(require_letters("Sol!", "ciphertext").unwrap(), vec![18, 14, 11]);
    }

    #[test]
    fn key_options_parse() {
        let args = Args::try_parse_from(["breaker", "vigenere", "--key", "sol", "--positions", "0,2", "abc"]).unwrap();
        match args.command {
            Command::Vigenere {
                key_length,
                key,
                positions,
                ..
            } => {
                assert_eq!(key_length, None);
                assert_eq!(key.as_deref(), Some("sol"));
                assert_eq!(positions, vec![0, 2]);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Args::try_parse_from(["breaker", "vigenere", "abc"]).is_err());
        assert!(Args::try_parse_from(["breaker", "vigenere", "-k", "3", "--positions", "1", "abc"]).is_err());
        assert!(Args::try_parse_from(["breaker", "hill", "--key", "1,7;0,17", "abc"]).is_ok());
    }
}
