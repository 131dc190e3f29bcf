use anyhow::{Context, Result};
use compressor_diagnosis::{
    AudioProcessor, DiagnosisEngine, EngineConfig, FaultClassifier, FeatureMode, FieldObservation,
};
use log::{info, warn};
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        println!("Usage:");
        println!("  {} predict <audio_file> [model_dir] [config.json]", args[0]);
        println!("  {} refrigerant <audio_file> [observations.json]", args[0]);
        return Ok(());
    }

    match args[1].as_str() {
        "predict" => run_predict(&args[2], args.get(3), args.get(4)),
        "refrigerant" => run_refrigerant(&args[2], args.get(3)),
        other => {
            println!("Invalid command '{}'. Use 'predict' or 'refrigerant'", other);
            Ok(())
        }
    }
}

fn run_predict(
    audio_file: &str,
    model_dir: Option<&String>,
    config_file: Option<&String>,
) -> Result<()> {
    info!("processing audio file: {}", audio_file);

    let config = match config_file {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading engine config from {}", path))?,
        None => EngineConfig::default(),
    };

    let processor = AudioProcessor::new(22050);
    let audio = processor
        .load_audio_file(audio_file)
        .with_context(|| format!("loading {}", audio_file))?;
    info!(
        "loaded {} samples ({:.2} seconds)",
        audio.len(),
        audio.duration_secs()
    );

    let mut engine = DiagnosisEngine::new(config);

    if let Some(dir) = model_dir {
        let root = Path::new(dir);
        match FaultClassifier::load(root.join("enhanced"), FeatureMode::Extended) {
            Ok(classifier) => engine = engine.with_enhanced(Box::new(classifier)),
            Err(e) => warn!("enhanced model not loaded: {}", e),
        }
        match FaultClassifier::load(root.join("basic"), FeatureMode::Compact) {
            Ok(classifier) => engine = engine.with_basic(Box::new(classifier)),
            Err(e) => warn!("basic model not loaded: {}", e),
        }
    }

    let prediction = engine.predict(&audio)?;

    println!("\n=== DIAGNOSIS ===");
    println!("Fault:      {}", prediction.label.description());
    println!("Label:      {}", prediction.label);
    println!("Confidence: {:.1}%", prediction.confidence * 100.0);
    println!("Source:     {:?}", prediction.provenance);
    if prediction.provenance == compressor_diagnosis::Provenance::Mock {
        println!("(demo output - no trained model was available)");
    }

    Ok(())
}

fn run_refrigerant(audio_file: &str, observations_file: Option<&String>) -> Result<()> {
    info!("refrigerant diagnosis for: {}", audio_file);

    let observations: Option<FieldObservation> = match observations_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading observations from {}", path))?;
            Some(serde_json::from_str(&raw).context("parsing field observations")?)
        }
        None => None,
    };

    let processor = AudioProcessor::new(22050);
    let audio = processor
        .load_audio_file(audio_file)
        .with_context(|| format!("loading {}", audio_file))?;

    let engine = DiagnosisEngine::new(EngineConfig::default());
    let verdict = engine.score_refrigerant(&audio, observations.as_ref())?;

    println!("\n=== REFRIGERANT DIAGNOSIS ===");
    println!("Level:      {:?}", verdict.refrigerant_level);
    println!("Urgency:    {:?}", verdict.urgency);
    println!("Score:      {}/100", verdict.total_score);
    println!("Confidence: {:.1}%", verdict.confidence * 100.0);
    println!("Action:     {}", verdict.recommended_action);
    println!("\nBreakdown:");
    for finding in &verdict.breakdown {
        println!("  {}", finding);
    }

    Ok(())
}
