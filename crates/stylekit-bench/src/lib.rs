//! # StyleKit Bench
//!
//! Performance benchmarking library for StyleKit.
//!
//! ## Features
//!
//! - CSS scanning and stylesheet construction benchmarks
//! - XHTML document build benchmarks
//! - Cascade resolution benchmarks, cold and cached
//! - Baseline comparison for regression detection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stylekit_bench::{Benchmark, BenchmarkSuite};
//!
//! let suite = Benchmark::new().run_all()?;
//! suite.print_summary();
//! let baseline = BenchmarkSuite::load_json("baseline.json")?;
//! for regression in suite.regressions(&baseline, 0.10) {
//!     eprintln!("{}", regression);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use stylekit_css::{attrs, AttributeRegistry, StyleSheet, StyleSheetResolver};
use stylekit_dom::{Document, DocumentBuilder, ElementId};
use thiserror::Error;
use tracing::{debug, info};

/// Benchmark errors.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed results file: {0}")]
    Results(#[from] serde_json::Error),

    #[error("Stylesheet error: {0}")]
    Css(#[from] stylekit_css::CssError),

    #[error("Document error: {0}")]
    Dom(#[from] stylekit_dom::DomError),
}

/// Timing statistics of one benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub iterations: u64,
    pub mean_ns: u64,
    pub median_ns: u64,
    pub std_dev_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    /// Input size per iteration, for byte throughput.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

impl BenchmarkResult {
    pub fn from_samples(name: impl Into<String>, samples: &[Duration]) -> Self {
        let mut times: Vec<u64> = samples.iter().map(|d| d.as_nanos() as u64).collect();
        times.sort_unstable();

        let n = times.len() as u64;
        let mean_ns = times.iter().sum::<u64>().checked_div(n).unwrap_or(0);
        let median_ns = match times.len() {
            0 => 0,
            len if len % 2 == 1 => times[len / 2],
            len => (times[len / 2 - 1] + times[len / 2]) / 2,
        };
        let std_dev_ns = if n > 1 {
            let sum_sq: f64 = times
                .iter()
                .map(|&t| (t as f64 - mean_ns as f64).powi(2))
                .sum();
            (sum_sq / (n - 1) as f64).sqrt() as u64
        } else {
            0
        };

        Self {
            name: name.into(),
            iterations: n,
            mean_ns,
            median_ns,
            std_dev_ns,
            min_ns: times.first().copied().unwrap_or(0),
            max_ns: times.last().copied().unwrap_or(0),
            bytes: None,
        }
    }

    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes as u64);
        self
    }

    /// Iterations per second at the median time.
    pub fn ops_per_sec(&self) -> f64 {
        if self.median_ns == 0 {
            return 0.0;
        }
        1e9 / self.median_ns as f64
    }

    /// Input bytes per second at the median time.
    pub fn bytes_per_sec(&self) -> Option<f64> {
        self.bytes.map(|b| b as f64 * self.ops_per_sec())
    }

    fn throughput(&self) -> String {
        match self.bytes_per_sec() {
            Some(rate) if rate >= 1024.0 * 1024.0 => {
                format!("{:.1} MiB/s", rate / (1024.0 * 1024.0))
            }
            Some(rate) => format!("{:.1} KiB/s", rate / 1024.0),
            None => format!("{:.0} op/s", self.ops_per_sec()),
        }
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:32} {:>10} {:>10} {:>14}",
            self.name,
            NanosDisplay(self.median_ns),
            NanosDisplay(self.std_dev_ns),
            self.throughput(),
        )
    }
}

struct NanosDisplay(u64);

impl fmt::Display for NanosDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.0 as f64;
        let text = match self.0 {
            0..=999 => format!("{} ns", self.0),
            1_000..=999_999 => format!("{:.2} µs", ns / 1e3),
            1_000_000..=999_999_999 => format!("{:.2} ms", ns / 1e6),
            _ => format!("{:.2} s", ns / 1e9),
        };
        f.pad(&text)
    }
}

/// A benchmark that got slower than its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub name: String,
    pub baseline_ns: u64,
    pub current_ns: u64,
}

impl Regression {
    /// Relative slowdown, 0.25 meaning 25% slower.
    pub fn slowdown(&self) -> f64 {
        self.current_ns as f64 / self.baseline_ns.max(1) as f64 - 1.0
    }
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} (+{:.1}%)",
            self.name,
            NanosDisplay(self.baseline_ns),
            NanosDisplay(self.current_ns),
            self.slowdown() * 100.0
        )
    }
}

/// Results of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub name: String,
    pub results: Vec<BenchmarkResult>,
    pub total_time: Duration,
}

impl BenchmarkSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Vec::new(),
            total_time: Duration::ZERO,
        }
    }

    pub fn add(&mut self, result: BenchmarkResult) {
        self.results.push(result);
    }

    pub fn result(&self, name: &str) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Benchmarks whose median is more than `tolerance` slower than in
    /// `baseline`. Benchmarks missing from either side are ignored.
    pub fn regressions(&self, baseline: &BenchmarkSuite, tolerance: f64) -> Vec<Regression> {
        self.results
            .iter()
            .filter_map(|current| {
                let base = baseline.result(&current.name)?;
                let regression = Regression {
                    name: current.name.clone(),
                    baseline_ns: base.median_ns,
                    current_ns: current.median_ns,
                };
                (regression.slowdown() > tolerance).then_some(regression)
            })
            .collect()
    }

    pub fn print_summary(&self) {
        let rule = "-".repeat(70);
        println!("{} ({} benchmarks)", self.name, self.results.len());
        println!("{:32} {:>10} {:>10} {:>14}", "name", "median", "stddev", "throughput");
        println!("{}", rule);
        for result in &self.results {
            println!("{}", result);
        }
        println!("{}", rule);
        println!("total {:?}", self.total_time);
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), BenchError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// A document, its stylesheet and every element id, ready for cascade runs.
pub struct Fixture {
    pub sheet: StyleSheet,
    pub document: Document,
    pub elements: Vec<ElementId>,
}

impl Fixture {
    /// Build a fixture of `sections` document sections styled by `rules`
    /// generated rules.
    pub fn generate(sections: usize, rules: usize) -> Result<Self, BenchError> {
        let registry = AttributeRegistry::standard();
        let mut sheet = StyleSheet::new(registry.clone());
        sheet.parse_str(&generate_css(rules))?;
        let document = DocumentBuilder::new(registry).build(&generate_document(sections))?;
        let mut elements = Vec::with_capacity(document.len());
        document.traverse(|id, _| elements.push(id));
        Ok(Self {
            sheet,
            document,
            elements,
        })
    }

    /// Resolve a handful of attributes for every element in one layout pass.
    pub fn resolve_all(&self) -> usize {
        let pass = self.sheet.layout();
        self.resolve_with(Some(pass.resolver()))
    }

    /// Resolve every element against an already running pass.
    pub fn resolve_with(&self, resolver: Option<&dyn StyleSheetResolver>) -> usize {
        let mut visible = 0;
        for &id in &self.elements {
            let color = self.document.get(id, attrs::COLOR, resolver);
            let margin = self.document.get(id, attrs::MARGIN_TOP, resolver);
            let size = self.document.get(id, attrs::FONT_SIZE, resolver);
            if color.argb() != 0 || margin.value > 0.0 || size.value > 0.0 {
                visible += 1;
            }
        }
        visible
    }
}

/// Benchmark runner.
pub struct Benchmark {
    pub warmup: u64,
    pub iterations: u64,
}

impl Benchmark {
    pub fn new() -> Self {
        Self {
            warmup: 10,
            iterations: 100,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warmup(mut self, warmup: u64) -> Self {
        self.warmup = warmup;
        self
    }

    /// Time `f` after the warmup runs.
    pub fn run<F>(&self, name: &str, mut f: F) -> BenchmarkResult
    where
        F: FnMut(),
    {
        debug!(name, warmup = self.warmup, iterations = self.iterations, "benchmark start");
        (0..self.warmup).for_each(|_| f());
        let samples: Vec<Duration> = (0..self.iterations)
            .map(|_| {
                let start = Instant::now();
                f();
                start.elapsed()
            })
            .collect();
        BenchmarkResult::from_samples(name, &samples)
    }

    /// Run the standard benchmarks: parsing, document building and cascade.
    pub fn run_all(&self) -> Result<BenchmarkSuite, BenchError> {
        let start = Instant::now();
        let mut suite = BenchmarkSuite::new("StyleKit");
        let registry = AttributeRegistry::standard();

        let large_css = generate_css(200);
        suite.add(
            self.run("css/scan/large", || {
                let _ = stylekit_cssparser::parse_stylesheet_str(&large_css);
            })
            .with_bytes(large_css.len()),
        );
        for (name, rules) in [("css/sheet/small", 10), ("css/sheet/large", 200)] {
            let css = generate_css(rules);
            let result = self.run(name, || {
                let mut sheet = StyleSheet::new(registry.clone());
                let _ = sheet.parse_str(&css);
            });
            suite.add(result.with_bytes(css.len()));
        }

        let builder = DocumentBuilder::new(registry.clone());
        for (name, sections) in [("dom/build/small", 10), ("dom/build/large", 500)] {
            let source = generate_document(sections);
            let result = self.run(name, || {
                let _ = builder.build(&source);
            });
            suite.add(result.with_bytes(source.len()));
        }

        let fixture = Fixture::generate(100, 50)?;
        suite.add(self.run("cascade/cold", || {
            fixture.resolve_all();
        }));
        {
            let pass = fixture.sheet.layout();
            let resolver = Some(pass.resolver());
            fixture.resolve_with(resolver);
            suite.add(self.run("cascade/cached", || {
                fixture.resolve_with(resolver);
            }));
        }

        suite.total_time = start.elapsed();
        info!(benchmarks = suite.results.len(), elapsed = ?suite.total_time, "suite finished");
        Ok(suite)
    }
}

impl Default for Benchmark {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an XHTML document with `n` styled sections.
pub fn generate_document(n: usize) -> String {
    let mut html = String::from(
        "<?xml version=\"1.0\"?><html><head><title>Bench</title></head><body>",
    );
    for i in 0..n {
        html.push_str(&format!(
            "<div class=\"section{}\" id=\"s{}\"><h2>Section {}</h2>\
             <p>Paragraph <b>{}</b> with <a href=\"#s{}\">a link</a>.</p>\
             <ol><li>first</li><li>second</li></ol></div>",
            i % 10,
            i,
            i,
            i,
            i
        ));
    }
    html.push_str("</body></html>");
    html
}

/// Generate CSS with `n` rules of mixed selector shapes.
pub fn generate_css(n: usize) -> String {
    let mut css = String::new();
    for i in 0..n {
        let selector = match i % 3 {
            0 => format!(".section{}", i % 10),
            1 => format!("div.section{} > p", i % 10),
            _ => format!("body .section{} li", i % 10),
        };
        css.push_str(&format!(
            "{} {{ margin: {}px; padding: {}px {}px; color: #{:06x}; }}\n",
            selector,
            i % 20,
            i % 7,
            i % 5,
            (i * 7919) & 0xff_ffff
        ));
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, median_ns: u64) -> BenchmarkResult {
        BenchmarkResult::from_samples(name, &[Duration::from_nanos(median_ns)])
    }

    #[test]
    fn test_statistics() {
        let samples = [120, 90, 100, 110].map(Duration::from_micros);
        let result = BenchmarkResult::from_samples("test", &samples);
        assert_eq!(result.iterations, 4);
        assert_eq!(result.min_ns, 90_000);
        assert_eq!(result.max_ns, 120_000);
        assert_eq!(result.median_ns, 105_000);
        assert_eq!(result.mean_ns, 105_000);
        assert!(result.std_dev_ns > 0);
    }

    #[test]
    fn test_empty_samples() {
        let result = BenchmarkResult::from_samples("empty", &[]);
        assert_eq!(result.median_ns, 0);
        assert_eq!(result.ops_per_sec(), 0.0);
    }

    #[test]
    fn test_throughput() {
        // 1 MiB in 1 ms
        let parse = result("parse", 1_000_000).with_bytes(1024 * 1024);
        assert_eq!(parse.throughput(), "1000.0 MiB/s");
        assert_eq!(result("op", 1_000).throughput(), "1000000 op/s");
    }

    #[test]
    fn test_nanos_display() {
        assert_eq!(NanosDisplay(500).to_string(), "500 ns");
        assert_eq!(NanosDisplay(1_500).to_string(), "1.50 µs");
        assert_eq!(NanosDisplay(1_500_000).to_string(), "1.50 ms");
        assert_eq!(NanosDisplay(1_500_000_000).to_string(), "1.50 s");
    }

    #[test]
    fn test_regressions() {
        let mut baseline = BenchmarkSuite::new("base");
        baseline.add(result("a", 1_000));
        baseline.add(result("b", 1_000));
        let mut current = BenchmarkSuite::new("now");
        current.add(result("a", 1_050));
        current.add(result("b", 1_500));
        current.add(result("new", 9_000));

        let regressions = current.regressions(&baseline, 0.10);
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].name, "b");
        assert!((regressions[0].slowdown() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_generated_inputs_parse() {
        let mut sheet = StyleSheet::new(AttributeRegistry::standard());
        let diagnostics = sheet.parse_str(&generate_css(12)).unwrap();
        assert!(diagnostics.is_empty());
        // built-in pre rule plus the generated ones
        assert_eq!(sheet.rules().len(), 13);

        let doc = DocumentBuilder::new(AttributeRegistry::standard())
            .build(&generate_document(3))
            .unwrap();
        assert!(doc.get_element_by_id("s2").is_some());
        assert_eq!(doc.title(), Some("Bench"));
    }

    #[test]
    fn test_fixture_resolves_every_element() {
        let fixture = Fixture::generate(4, 9).unwrap();
        assert!(fixture.elements.len() > 4);
        assert!(fixture.resolve_all() > 0);
        assert_eq!(fixture.sheet.cached_entries(), 0);
    }

    #[test]
    fn test_run_all_round_trips_through_json() {
        let suite = Benchmark::new()
            .with_warmup(0)
            .with_iterations(2)
            .run_all()
            .unwrap();
        assert_eq!(suite.results.len(), 7);
        assert!(suite.result("dom/build/large").unwrap().bytes.is_some());
        assert!(suite.result("cascade/cold").unwrap().bytes.is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        suite.save_json(&path).unwrap();
        let loaded = BenchmarkSuite::load_json(&path).unwrap();
        assert_eq!(loaded.results.len(), 7);
        assert!(suite.regressions(&loaded, 0.0).is_empty());
    }
}
