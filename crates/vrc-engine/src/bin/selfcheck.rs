use tokio::process::Command;

use vrc_engine::{EngineConfig, Recompressor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = EngineConfig::from_env();

    println!(
        "vrc-selfcheck: starting with ffmpeg={} ffprobe={}",
        config.ffmpeg_bin, config.ffprobe_bin
    );
    config.backend().check()?;
    ensure_runs(&config.ffmpeg_bin).await?;
    ensure_runs(&config.ffprobe_bin).await?;

    let capabilities = Recompressor::new(config).capabilities();
    println!(
        "vrc-selfcheck: video codecs {:?}, audio codecs {:?}",
        capabilities.video_codecs, capabilities.audio_codecs
    );

    println!("vrc-selfcheck: ok");
    Ok(())
}

async fn ensure_runs(binary: &str) -> anyhow::Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("{} not available: {}", binary, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("{} -version failed: {:?}", binary, output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(first) = stdout.lines().next() {
        println!("vrc-selfcheck: {}", first);
    }
    Ok(())
}
