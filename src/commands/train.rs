//! Train Command
//!
//! Tokenizes the train/valid files, builds (or restores) the network and runs
//! the epoch driver.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use burn::module::Module;
use burn::tensor::backend::Backend;
use clap::Args;

use crate::backend::{backend_name, select_device, TrainBackend};
use crate::data::BatchedCorpus;
use crate::error::{LmError, Result};
use crate::model::{
    Checkpoint, CheckpointPaths, ClipMode, ModelConfig, RnnType, Trainer, TrainingConfig, WeightImport,
};
use crate::tokenizer::ByteTokenizer;
use crate::utils::{format_bytes, format_duration, format_params};

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Prefix of the per-epoch checkpoint files
    #[arg(long, alias = "save_model", default_value = "lm")]
    pub save_model: String,

    /// Checkpoint to resume from (empty: fresh model)
    #[arg(long, alias = "load_model", default_value = "")]
    pub load_model: String,

    #[arg(long, default_value = "data/input.txt")]
    pub train: PathBuf,

    #[arg(long, default_value = "data/valid.txt")]
    pub valid: PathBuf,

    #[arg(long, alias = "rnn_type", value_enum, default_value = "gru")]
    pub rnn_type: RnnType,

    #[arg(long, default_value = "1")]
    pub layers: usize,

    #[arg(long, alias = "rnn_size", default_value = "1024")]
    pub rnn_size: usize,

    #[arg(long, alias = "embed_size", default_value = "128")]
    pub embed_size: usize,

    #[arg(long, alias = "seq_length", default_value = "20")]
    pub seq_length: usize,

    #[arg(long, alias = "batch_size", default_value = "64")]
    pub batch_size: usize,

    #[arg(long, alias = "learning_rate", default_value = "0.001")]
    pub learning_rate: f64,

    #[arg(long, default_value = "0.1")]
    pub dropout: f64,

    #[arg(long, alias = "param_init", default_value = "0.05")]
    pub param_init: f64,

    #[arg(long, default_value = "5")]
    pub clip: f64,

    #[arg(long, default_value = "1234")]
    pub seed: u64,

    /// Run on the accelerator backend
    #[arg(long)]
    pub cuda: bool,

    /// Start from the pretrained mLSTM arrays in `--weights-dir`
    #[arg(long)]
    pub ns: bool,

    #[arg(long, default_value = "10")]
    pub epochs: usize,

    #[arg(long, alias = "lr_decay", default_value = "0.7")]
    pub lr_decay: f64,

    #[arg(long, alias = "clip_mode", value_enum, default_value = "value")]
    pub clip_mode: ClipMode,

    #[arg(long, alias = "log_every", default_value = "10")]
    pub log_every: usize,

    /// Rolling mid-epoch checkpoint (empty disables it)
    #[arg(long, alias = "temp_checkpoint", default_value = "temp")]
    pub temp_checkpoint: String,

    #[arg(long, alias = "weights_dir", default_value = ".")]
    pub weights_dir: PathBuf,
}

impl TrainArgs {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new()
            .with_rnn_type(self.rnn_type)
            .with_layers(self.layers)
            .with_rnn_size(self.rnn_size)
            .with_embed_size(self.embed_size)
            .with_dropout(self.dropout)
            .with_param_init(self.param_init)
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::new()
            .with_seq_length(self.seq_length)
            .with_batch_size(self.batch_size)
            .with_learning_rate(self.learning_rate)
            .with_lr_decay(self.lr_decay)
            .with_clip(self.clip)
            .with_clip_mode(self.clip_mode)
            .with_epochs(self.epochs)
            .with_log_every(self.log_every)
            .with_seed(self.seed)
    }

    /// `--ns` overwrites the network it is applied to, so it only combines
    /// with a freshly built model.
    pub fn validate(&self) -> Result<()> {
        if self.ns && !self.load_model.is_empty() {
            return Err(LmError::Config(
                "--ns imports pretrained weights into a fresh model and cannot be combined with --load-model".into(),
            ));
        }
        Ok(())
    }

    pub fn checkpoint_paths(&self) -> CheckpointPaths {
        let temp = (!self.temp_checkpoint.is_empty()).then(|| PathBuf::from(&self.temp_checkpoint));
        CheckpointPaths::new(self.save_model.clone()).with_temp(temp)
    }
}

fn load_corpus(tokenizer: &ByteTokenizer, path: &PathBuf, batch_size: usize) -> Result<BatchedCorpus> {
    let tokens = tokenizer.tokenize_file(path)?;
    let corpus = BatchedCorpus::batchify(&tokens, batch_size)?;
    tracing::info!(
        "{}: {} tokens ({}) -> {} steps x {} columns",
        path.display(),
        tokens.len(),
        format_bytes(tokens.len()),
        corpus.steps(),
        corpus.batch_size()
    );
    Ok(corpus)
}

pub fn execute(args: &TrainArgs, interrupt: &AtomicBool) -> Result<Vec<PathBuf>> {
    args.validate()?;
    let device = select_device(args.cuda)?;
    let model_config = args.model_config();
    let training_config = args.training_config();
    model_config.validate()?;
    training_config.validate()?;

    tracing::info!("Backend: {}", backend_name());

    let tokenizer = ByteTokenizer::new(training_config.seq_length)?;
    let train = load_corpus(&tokenizer, &args.train, training_config.batch_size)?;
    let valid = load_corpus(&tokenizer, &args.valid, training_config.batch_size)?;

    let (embed, rnn, model_config) = if args.load_model.is_empty() {
        <TrainBackend as Backend>::seed(training_config.seed);
        let embed = model_config.init_embedding::<TrainBackend>(&device);
        let rnn = model_config.stacked().init::<TrainBackend>(&device)?;
        (embed, rnn, model_config)
    } else {
        let loaded = Checkpoint::load::<TrainBackend>(&PathBuf::from(&args.load_model), &device)?;
        (loaded.embed, loaded.rnn, loaded.model)
    };

    let (embed, rnn) = if args.ns {
        WeightImport::from_npy_dir(&args.weights_dir)?.apply(embed, rnn, &device)?
    } else {
        (embed, rnn)
    };

    tracing::info!(
        "Parameters: {} (embedding {})",
        format_params(model_config.num_parameters()),
        format_params(embed.num_params())
    );

    let mut trainer = Trainer::<TrainBackend>::from_parts(embed, rnn, model_config, training_config, device)?;

    let start = Instant::now();
    let summaries = trainer.fit(&train, &valid, &args.checkpoint_paths(), interrupt)?;

    if let Some(last) = summaries.last() {
        tracing::info!(
            "Finished {} epoch(s) in {}, last valid loss {:.4}",
            summaries.len(),
            format_duration(start.elapsed().as_secs()),
            last.valid.loss
        );
    }

    Ok(summaries.into_iter().map(|s| s.checkpoint).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: TrainArgs,
    }

    fn parse(argv: &[&str]) -> TrainArgs {
        let mut full = vec!["charnn"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.rnn_type, RnnType::Gru);
        assert_eq!(args.save_model, "lm");
        assert!(args.load_model.is_empty());
        assert!(!args.ns);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_underscore_aliases() {
        let args = parse(&["--rnn_type", "mlstm", "--seq_length", "32", "--clip_mode", "norm"]);
        assert_eq!(args.rnn_type, RnnType::MLstm);
        assert_eq!(args.seq_length, 32);
        assert_eq!(args.clip_mode, ClipMode::Norm);
    }

    #[test]
    fn test_ns_with_load_model_rejected() {
        let args = parse(&["--ns", "--load-model", "lm_e3_1.20.pt"]);
        match args.validate() {
            Err(LmError::Config(msg)) => assert!(msg.contains("--load-model")),
            other => panic!("expected config error, got {:?}", other),
        }

        assert!(parse(&["--ns"]).validate().is_ok());
        assert!(parse(&["--load-model", "lm_e3_1.20.pt"]).validate().is_ok());
    }
}
