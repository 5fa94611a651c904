use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

/// Write synthetic Phantom-style `.ev` files for trying out evplot.
#[derive(Parser, Debug)]
#[command(name = "generate_sample", about)]
struct Args {
    /// Directory the files are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Number of runs (one file each)
    #[arg(short, long, default_value_t = 3)]
    runs: usize,

    /// Output steps per run
    #[arg(short = 'n', long, default_value_t = 500)]
    steps: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

const COLUMNS: [&str; 8] = [
    "time", "ekin", "etherm", "emag", "epot", "etot", "totmom", "angtot",
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// `# [01        time] [02        ekin] ...`
fn header_line() -> String {
    let descriptors: Vec<String> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| format!("[{:02} {name:>11}]", i + 1))
        .collect();
    format!("# {}", descriptors.join(" "))
}

/// A damped star: kinetic energy sloshes into thermal energy while the
/// potential well slowly deepens. Total energy drifts only by noise.
fn sample_row(t: f64, damping: f64, rng: &mut SimpleRng) -> [f64; 8] {
    let noise = |rng: &mut SimpleRng| rng.gauss(0.0, 1e-5);
    let ekin = 0.05 * (-damping * t).exp() * (1.0 + (0.8 * t).cos()) + noise(rng);
    let etherm = 0.2 + 0.1 * (1.0 - (-damping * t).exp()) + noise(rng);
    let emag = 1e-4 * (0.3 * t).sin().abs();
    let epot = -0.6 - 0.05 * (1.0 - (-0.5 * damping * t).exp());
    let etot = ekin + etherm + emag + epot;
    let totmom = 1e-12 * rng.next_f64();
    let angtot = 1e-3 + rng.gauss(0.0, 1e-9);
    [t, ekin, etherm, emag, epot, etot, totmom, angtot]
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    for run in 0..args.runs {
        let damping = 0.01 * (run as f64 + 1.0);
        let path = args.out_dir.join(format!("run{:02}01.ev", run));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{}", header_line())?;
        for step in 0..args.steps {
            let row = sample_row(step as f64 * 0.1, damping, &mut rng);
            let fields: Vec<String> = row.iter().map(|v| format!("{v:>18.10E}")).collect();
            writeln!(out, "{}", fields.join(" "))?;
        }
        out.flush().with_context(|| format!("writing {}", path.display()))?;

        println!("Wrote {} steps to {}", args.steps, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parses_back() {
        let descriptors = evplot::data::loader::parse_header("gen", &header_line()).unwrap();
        assert_eq!(descriptors.len(), COLUMNS.len());
        assert_eq!(descriptors[0].index, 1);
        assert_eq!(descriptors[7].name, "angtot");
    }

    #[test]
    fn rows_are_parseable_floats() {
        let mut rng = SimpleRng::new(1);
        let row = sample_row(1.0, 0.02, &mut rng);
        let text = row.iter().map(|v| format!("{v:>18.10E}")).collect::<Vec<_>>().join(" ");
        let parsed: Vec<f64> = text.split_whitespace().map(|s| s.parse().unwrap()).collect();
        assert_eq!(parsed.len(), COLUMNS.len());
        assert_eq!(parsed[0], 1.0);
    }
}
