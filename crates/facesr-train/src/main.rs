use clap::Parser;
use tracing_subscriber::EnvFilter;

use facesr_core::Result;
use facesr_data::rgb_mean;
use facesr_train::cli::{Cli, Command, RgbMeanArgs, TrainArgs, UpscaleArgs};
use facesr_train::{load_dataset, make_rng, TrainConfig, Trainer, Upscaler};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Train(args) => train(args),
        Command::Upscale(args) => upscale(args),
        Command::RgbMean(args) => print_rgb_mean(args),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = TrainConfig::from_file(&args.config)?;
    config.resume |= args.resume;

    let mut rng = make_rng(config.seed);
    let split = load_dataset(&config, &mut rng)?;
    tracing::info!(
        train = split.train.len(),
        test = split.test.len(),
        validation = split.validation.len(),
        "Dataset split"
    );

    let mean = if config.use_rgb_mean {
        Some(rgb_mean(config.hr_shape(), &split.train)?)
    } else {
        None
    };
    let resume = config.resume;

    let mut trainer = Trainer::new(config)?;
    if let Some(mean) = mean {
        tracing::info!(r = mean[0], g = mean[1], b = mean[2], "Using dataset RGB mean");
        trainer = trainer.with_rgb_mean(mean);
    }
    if resume {
        trainer.resume()?;
    }

    let report = trainer.run(&split)?;
    tracing::info!(
        run = %report.run_id,
        epochs = report.epochs_run,
        best_perc_loss = ?report.best_perceptual_loss,
        "Training finished"
    );

    if args.evaluate && !split.validation.is_empty() {
        let eval = trainer.evaluate(&split.validation)?;
        println!(
            "validation: {} images, mse {:.6}, psnr {:.2} dB",
            eval.images, eval.mse, eval.psnr
        );
    }
    if let Some(path) = report.best_generator {
        println!("best generator: {}", path.display());
    }
    Ok(())
}

fn upscale(args: UpscaleArgs) -> Result<()> {
    let device = args.device.device()?;
    let upscaler = Upscaler::load(
        &args.weights,
        args.network,
        args.scale,
        args.filters,
        args.res_blocks,
        &device,
    )?;
    let shape = upscaler.upscale_file(&args.input, &args.output)?;
    println!("{} ({})", args.output.display(), shape);
    Ok(())
}

fn print_rgb_mean(args: RgbMeanArgs) -> Result<()> {
    let config = TrainConfig::from_file(&args.config)?;
    let mut rng = make_rng(config.seed);
    let split = load_dataset(&config, &mut rng)?;

    let mean = rgb_mean(config.hr_shape(), &split.train)?;
    println!("[{:.6}, {:.6}, {:.6}]", mean[0], mean[1], mean[2]);
    Ok(())
}
