use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use sleuth_engine::{Metric, PointEvaluation, Prediction, RankBy};
use std::io::Write;
use std::time::Duration;

use crate::checks::CheckResult;
use crate::workers::{PointFailure, describe};

#[derive(Serialize)]
struct CalibrationReport<'a> {
    rank_by: RankBy,
    points: &'a [PointEvaluation],
    failures: &'a [PointFailure],
}

pub fn generate_console_report<W: Write>(
    out: &mut W,
    ranked: &[PointEvaluation],
    failures: &[PointFailure],
    rank: RankBy,
    top: usize,
    duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Calibration Results".bright_cyan().bold())?;
    writeln!(out, "{}", "======================".cyan())?;
    writeln!(out, "Sweep points: {}", ranked.len() + failures.len())?;
    writeln!(out, "Scored: {}", ranked.len().to_string().green())?;
    writeln!(out, "Failed: {}", failures.len().to_string().red())?;
    writeln!(out, "Ranked by: {}", rank.as_str())?;
    writeln!(out, "Sweep time: {duration:?}")?;
    writeln!(out)?;

    for (position, evaluation) in ranked.iter().take(top).enumerate() {
        let score = &evaluation.score;
        let label = format!(
            "#{} run {} [{}]",
            position + 1,
            evaluation.run,
            describe(evaluation.coefficients)
        );
        let label = if position == 0 {
            label.green().bold()
        } else {
            label.normal()
        };
        writeln!(out, "{label}")?;
        writeln!(
            out,
            "   product {:.5}  osm {:.5}  compare {:.4}  leesalee {:.4}",
            score.product, score.osm, score.compare, score.leesalee
        )?;
        writeln!(
            out,
            "   r² pop {:.3}  edges {:.3}  clusters {:.3}  slope {:.3}",
            score.r_squared(Metric::Population),
            score.r_squared(Metric::Edges),
            score.r_squared(Metric::Clusters),
            score.r_squared(Metric::AverageSlope)
        )?;
    }
    if ranked.len() > top {
        writeln!(out, "   … {} more", ranked.len() - top)?;
    }

    if !failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "⚠️  Failed points".bright_yellow().bold())?;
        for failure in failures {
            writeln!(out, "   • {}", failure.message.red())?;
        }
    }
    Ok(())
}

pub fn generate_json_report<W: Write>(
    out: &mut W,
    ranked: &[PointEvaluation],
    failures: &[PointFailure],
    rank: RankBy,
) -> Result<()> {
    let report = CalibrationReport {
        rank_by: rank,
        points: ranked,
        failures,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write>(
    out: &mut W,
    ranked: &[PointEvaluation],
    failures: &[PointFailure],
    rank: RankBy,
) -> Result<()> {
    writeln!(out, "# SLEUTH Calibration Results\n")?;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Scored points**: {}", ranked.len())?;
    writeln!(out, "- **Failed points**: {}", failures.len())?;
    writeln!(out, "- **Ranked by**: {}\n", rank.as_str())?;

    writeln!(out, "## Ranking\n")?;
    writeln!(
        out,
        "| Rank | Run | Diff | Brd | Sprd | Slp | RG | Compare | Leesalee | Product | OSM |"
    )?;
    writeln!(
        out,
        "|-----:|----:|-----:|----:|-----:|----:|---:|--------:|---------:|--------:|----:|"
    )?;
    for (position, evaluation) in ranked.iter().enumerate() {
        let c = evaluation.coefficients;
        let s = &evaluation.score;
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {:.4} | {:.4} | {:.5} | {:.5} |",
            position + 1,
            evaluation.run,
            c.diffusion,
            c.breed,
            c.spread,
            c.slope_resistance,
            c.road_gravity,
            s.compare,
            s.leesalee,
            s.product,
            s.osm
        )?;
    }

    if !failures.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for failure in failures {
            writeln!(out, "- {}", failure.message)?;
        }
    }
    Ok(())
}

pub fn generate_csv_report<W: Write>(out: &mut W, ranked: &[PointEvaluation]) -> Result<()> {
    write!(
        out,
        "rank,run,diffusion,breed,spread,slope_resistance,road_gravity,compare,leesalee,product,osm"
    )?;
    for metric in Metric::FITTED {
        write!(out, ",r2_{}", metric.as_str())?;
    }
    writeln!(out)?;
    for (position, evaluation) in ranked.iter().enumerate() {
        let c = evaluation.coefficients;
        let s = &evaluation.score;
        write!(
            out,
            "{},{},{},{},{},{},{},{:.6},{:.6},{:.6},{:.6}",
            position + 1,
            evaluation.run,
            c.diffusion,
            c.breed,
            c.spread,
            c.slope_resistance,
            c.road_gravity,
            s.compare,
            s.leesalee,
            s.product,
            s.osm
        )?;
        for metric in Metric::FITTED {
            write!(out, ",{:.6}", s.r_squared(metric))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn generate_prediction_report<W: Write>(
    out: &mut W,
    prediction: &Prediction,
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            serde_json::to_writer_pretty(&mut *out, prediction)?;
            writeln!(out)?;
        }
        "csv" => {
            writeln!(out, "year,iterations,population_mean,population_std,percent_urban_mean,growth_rate_mean")?;
            for year in &prediction.years {
                writeln!(
                    out,
                    "{},{},{:.3},{:.3},{:.3},{:.3}",
                    year.year,
                    year.iterations,
                    year.mean(Metric::Population),
                    year.std_dev(Metric::Population),
                    year.mean(Metric::PercentUrban),
                    year.mean(Metric::GrowthRate)
                )?;
            }
        }
        "markdown" => {
            writeln!(out, "# SLEUTH Prediction\n")?;
            writeln!(
                out,
                "- **Window**: {}–{}\n- **Coefficients**: {}\n",
                prediction.start_year,
                prediction.stop_year,
                describe(prediction.coefficients)
            )?;
            writeln!(out, "| Year | Population | ± | Percent urban | Growth rate |")?;
            writeln!(out, "|-----:|-----------:|--:|--------------:|------------:|")?;
            for year in &prediction.years {
                writeln!(
                    out,
                    "| {} | {:.1} | {:.1} | {:.2} | {:.2} |",
                    year.year,
                    year.mean(Metric::Population),
                    year.std_dev(Metric::Population),
                    year.mean(Metric::PercentUrban),
                    year.mean(Metric::GrowthRate)
                )?;
            }
        }
        _ => {
            writeln!(out)?;
            writeln!(out, "{}", "🔮 Prediction".bright_cyan().bold())?;
            writeln!(out, "{}", "=============".cyan())?;
            writeln!(
                out,
                "Window {}..={} with [{}]",
                prediction.start_year,
                prediction.stop_year,
                describe(prediction.coefficients)
            )?;
            for year in &prediction.years {
                writeln!(
                    out,
                    "   {}  population {:>8.1} ± {:<6.1} percent urban {:>6.2}",
                    year.year,
                    year.mean(Metric::Population),
                    year.std_dev(Metric::Population),
                    year.mean(Metric::PercentUrban)
                )?;
            }
            let likely = prediction
                .probability
                .values()
                .iter()
                .filter(|&&p| p >= 0.5)
                .count();
            writeln!(out, "Pixels urban in at least half the iterations: {likely}")?;
        }
    }
    Ok(())
}

pub fn generate_check_report<W: Write>(
    out: &mut W,
    results: &[CheckResult],
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            serde_json::to_writer_pretty(&mut *out, results)?;
            writeln!(out)?;
        }
        "csv" => {
            writeln!(out, "check,passed,seeds_run,successful_seeds,average_millis")?;
            for r in results {
                writeln!(
                    out,
                    "{},{},{},{},{:.3}",
                    r.check_name, r.passed, r.seeds_run, r.successful_seeds, r.average_millis
                )?;
            }
        }
        "markdown" => {
            writeln!(out, "# SLEUTH Engine Checks\n")?;
            for r in results {
                let status = if r.passed { "✅" } else { "❌" };
                writeln!(out, "### {status} {}\n", r.check_name)?;
                writeln!(
                    out,
                    "- **Seeds**: {}/{} passed",
                    r.successful_seeds, r.seeds_run
                )?;
                writeln!(out, "- **Average time**: {:.2} ms", r.average_millis)?;
                for failure in &r.failures {
                    writeln!(out, "  - {failure}")?;
                }
                writeln!(out)?;
            }
        }
        _ => {
            writeln!(out)?;
            writeln!(out, "{}", "📊 Engine Check Summary".bright_cyan().bold())?;
            writeln!(out, "{}", "=======================".cyan())?;
            let passed = results.iter().filter(|r| r.passed).count();
            writeln!(out, "Passed: {}", passed.to_string().green())?;
            writeln!(out, "Failed: {}", (results.len() - passed).to_string().red())?;
            writeln!(out)?;
            for r in results {
                let status = if r.passed {
                    "✅ PASS".green()
                } else {
                    "❌ FAIL".red()
                };
                writeln!(out, "{status} {}", r.check_name.bold())?;
                writeln!(
                    out,
                    "   Seeds: {}/{} passed, {:.2} ms average",
                    r.successful_seeds, r.seeds_run, r.average_millis
                )?;
                for failure in &r.failures {
                    writeln!(out, "     • {}", failure.red())?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_engine::{CalibrationScore, SavedCoefficients, UrbanizationAttempts};
    use std::collections::BTreeMap;

    fn evaluation(run: usize, product: f64) -> PointEvaluation {
        PointEvaluation {
            run,
            coefficients: SavedCoefficients {
                diffusion: 5,
                breed: 10,
                spread: 15,
                slope_resistance: 20,
                road_gravity: 25,
            },
            score: CalibrationScore {
                compare: 0.9,
                leesalee: 0.8,
                fmatch: 1.0,
                r_squared: Metric::FITTED.iter().map(|m| (*m, 0.5)).collect::<BTreeMap<_, _>>(),
                product,
                osm: product / 2.0,
            },
            years: Vec::new(),
            attempts: UrbanizationAttempts::default(),
        }
    }

    fn failure() -> PointFailure {
        PointFailure {
            run: 9,
            coefficients: evaluation(9, 0.0).coefficients,
            message: "sweep point 9 (5/10/15/20/25): boom".to_string(),
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn csv_has_one_row_per_point_and_every_metric_column() {
        let ranked = vec![evaluation(1, 0.3), evaluation(0, 0.1)];
        let text = render(|out| generate_csv_report(out, &ranked));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split(',').count(), 11 + Metric::FITTED.len());
        assert!(lines[1].starts_with("1,1,5,10,15,20,25,"));
        assert!(lines[0].contains("r2_mean_cluster_size"));
    }

    #[test]
    fn json_report_carries_failures_and_rank() {
        let ranked = vec![evaluation(0, 0.2)];
        let failures = vec![failure()];
        let text = render(|out| generate_json_report(out, &ranked, &failures, RankBy::Osm));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["rank_by"], "osm");
        assert_eq!(value["points"].as_array().unwrap().len(), 1);
        assert_eq!(value["failures"][0]["run"], 9);
    }

    #[test]
    fn markdown_lists_failures() {
        let ranked = vec![evaluation(0, 0.2)];
        let text =
            render(|out| generate_markdown_report(out, &ranked, &[failure()], RankBy::Product));
        assert!(text.contains("# SLEUTH Calibration Results"));
        assert!(text.contains("| 1 | 0 | 5 | 10 | 15 | 20 | 25 |"));
        assert!(text.contains("## Failures"));
    }

    #[test]
    fn console_report_truncates_to_top() {
        colored::control::set_override(false);
        let ranked: Vec<PointEvaluation> = (0..5).map(|run| evaluation(run, 0.1)).collect();
        let text = render(|out| {
            generate_console_report(out, &ranked, &[], RankBy::Product, 2, Duration::ZERO)
        });
        assert!(text.contains("#2 run 1"));
        assert!(!text.contains("#3 run"));
        assert!(text.contains("3 more"));
    }

    #[test]
    fn check_report_formats() {
        let results = vec![CheckResult {
            check_name: "determinism".to_string(),
            passed: false,
            seeds_run: 2,
            successful_seeds: 1,
            failures: vec!["seed 2: fingerprints differ".to_string()],
            average_millis: 1.5,
        }];
        let csv = render(|out| generate_check_report(out, &results, "csv"));
        assert!(csv.contains("determinism,false,2,1,1.500"));
        let md = render(|out| generate_check_report(out, &results, "markdown"));
        assert!(md.contains("❌ determinism"));
        let json = render(|out| generate_check_report(out, &results, "json"));
        assert!(json.contains("\"successful_seeds\": 1"));
    }
}
