//! Synthetic sample source.
//!
//! A generator thread encodes wave samples into wire frames every period and
//! sends them over a channel; a receiver thread decodes each frame and feeds
//! the named series.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use oscillo_engine::chart::{Sample, SeriesFeed};
use oscillo_engine::time::{Clock, MILLISECOND, SECOND};
use oscillo_engine::wire;

/// Generator settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Interval between sent frames.
    pub period: Duration,
    /// Spacing of generated samples, in stream units.
    pub sample_step: i64,
    /// Divisor applied to time before the wave functions.
    pub wave_period: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(16),
            sample_step: MILLISECOND,
            wave_period: SECOND / 2,
        }
    }
}

/// Wave generated for one named series.
#[derive(Debug, Copy, Clone)]
pub enum Wave {
    Sin,
    Cos,
    /// Tangent clamped to ±2.
    Tan,
}

impl Wave {
    /// Half-amplitude wave value at phase `x`.
    pub fn value(self, x: f64) -> f64 {
        match self {
            Wave::Sin => x.sin() / 2.0,
            Wave::Cos => x.cos() / 2.0,
            Wave::Tan => (x.tan() / 2.0).clamp(-2.0, 2.0),
        }
    }
}

/// Running source threads. Stopped on drop.
pub struct SourceHandle {
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl SourceHandle {
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        for t in self.threads.drain(..) {
            if t.join().is_err() {
                log::error!("source thread panicked");
            }
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the generator and receiver threads.
pub fn spawn(
    config: SourceConfig,
    waves: Vec<(String, Wave)>,
    feeds: HashMap<String, SeriesFeed>,
    clock: Arc<dyn Clock>,
) -> Result<SourceHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<String>();

    let generator = {
        let stop = stop.clone();
        thread::Builder::new()
            .name("oscillo-generator".into())
            .spawn(move || generate(&config, &waves, clock.as_ref(), &stop, &tx))
            .context("failed to spawn generator thread")?
    };

    let receiver = thread::Builder::new()
        .name("oscillo-receiver".into())
        .spawn(move || receive(&rx, &feeds))
        .context("failed to spawn receiver thread")?;

    Ok(SourceHandle {
        stop,
        threads: vec![generator, receiver],
    })
}

fn generate(
    config: &SourceConfig,
    waves: &[(String, Wave)],
    clock: &dyn Clock,
    stop: &AtomicBool,
    tx: &mpsc::Sender<String>,
) {
    let step = config.sample_step.max(1);
    let mut next = clock.now();

    while !stop.load(Ordering::Acquire) {
        let now = clock.now();
        let mut frame: wire::Frame = waves
            .iter()
            .map(|(name, _)| (name.clone(), Vec::new()))
            .collect();

        while next <= now {
            let x = next as f64 / config.wave_period as f64;
            for (name, wave) in waves {
                if let Some(batch) = frame.get_mut(name) {
                    batch.push(Sample::new(next, wave.value(x)));
                }
            }
            next += step;
        }

        match wire::encode_frame(&frame) {
            Ok(json) => {
                if tx.send(json).is_err() {
                    break;
                }
            }
            Err(e) => log::error!("failed to encode frame: {e}"),
        }

        thread::sleep(config.period);
    }
    log::debug!("generator stopped");
}

fn receive(rx: &mpsc::Receiver<String>, feeds: &HashMap<String, SeriesFeed>) {
    for json in rx {
        let frame = match wire::decode_frame(&json) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("dropping undecodable frame: {e}");
                continue;
            }
        };
        for (name, batch) in &frame {
            match feeds.get(name) {
                Some(feed) => feed.ingest(batch),
                None => log::debug!("no series named `{name}`"),
            }
        }
    }
    log::debug!("receiver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waves_are_half_amplitude() {
        assert_eq!(Wave::Sin.value(0.0), 0.0);
        assert_eq!(Wave::Cos.value(0.0), 0.5);
        assert!((Wave::Sin.value(std::f64::consts::FRAC_PI_2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tan_is_clamped() {
        assert_eq!(Wave::Tan.value(std::f64::consts::FRAC_PI_2 - 1e-9), 2.0);
        assert_eq!(Wave::Tan.value(-std::f64::consts::FRAC_PI_2 + 1e-9), -2.0);
        assert!((Wave::Tan.value(0.5) - 0.5f64.tan() / 2.0).abs() < 1e-12);
    }
}
