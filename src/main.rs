use std::path::PathBuf;

use anyhow::Result;
use clap::{value_parser, Arg, ArgMatches, Command};

mod compare; // run_compare: load both gamma tables, correlate per gene, align, plot
mod gammas;
mod pearson;
mod scatter;

use compare::CompareConfig;
use gammas::ColumnOverrides;

fn main() {
    if let Err(e) = real_main() {
        eprintln!("[ERROR] {e:?}");
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("compare_pearsons")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scatter plot of per-gene Pearson r (measured vs predicted gamma) from two variant tables")
        .arg(
            Arg::new("xgammas")
                .help("file: unique entries for gamma by variant -- x axis")
                .long("xgammas")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE"),
        )
        .arg(
            Arg::new("xname")
                .help("str: label name for x axis")
                .long("xname")
                .required(true)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("ygammas")
                .help("file: unique entries for gamma by variant -- y axis")
                .long("ygammas")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE"),
        )
        .arg(
            Arg::new("yname")
                .help("str: label name for y axis")
                .long("yname")
                .required(true)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("pngfile")
                .help("Output PNG path (parent directory is created if missing)")
                .long("pngfile")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .value_name("PNG"),
        )
        .arg(
            Arg::new("width")
                .help("Output width in pixels (default 6in at 300dpi)")
                .long("width")
                .required(false)
                .value_parser(value_parser!(u32))
                .default_value("1800"),
        )
        .arg(
            Arg::new("height")
                .help("Output height in pixels (default 6in at 300dpi)")
                .long("height")
                .required(false)
                .value_parser(value_parser!(u32))
                .default_value("1800"),
        )
        .arg(
            Arg::new("threads")
                .help("Rayon worker threads (optional)")
                .long("threads")
                .short('T')
                .required(false)
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("gene-col")
                .help("Header of the gene column (default: first of gene, gene_name, gene_id)")
                .long("gene-col")
                .required(false)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("variant-col")
                .help("Header of the variant column (default: first of variant, variant_id, sgrna, guide, name)")
                .long("variant-col")
                .required(false)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("meas-col")
                .help("Header of the measured gamma column (default: first of y_meas, gamma, relgamma, measured)")
                .long("meas-col")
                .required(false)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("pred-col")
                .help("Header of the predicted gamma column (default: first of y_pred, prediction, predicted, pred)")
                .long("pred-col")
                .required(false)
                .value_name("NAME"),
        )
}

fn config_from_matches(matches: &ArgMatches) -> CompareConfig {
    let path = |id: &str| {
        matches
            .get_one::<PathBuf>(id)
            .cloned()
            .expect("required by clap")
    };
    let text = |id: &str| {
        matches
            .get_one::<String>(id)
            .cloned()
            .expect("required by clap")
    };
    let optional = |id: &str| matches.get_one::<String>(id).cloned();

    CompareConfig {
        x_gammas: path("xgammas"),
        x_name: text("xname"),
        y_gammas: path("ygammas"),
        y_name: text("yname"),
        png_file: path("pngfile"),
        width: *matches
            .get_one::<u32>("width")
            .expect("default provided by clap"),
        height: *matches
            .get_one::<u32>("height")
            .expect("default provided by clap"),
        columns: ColumnOverrides {
            gene: optional("gene-col"),
            variant: optional("variant-col"),
            measured: optional("meas-col"),
            predicted: optional("pred-col"),
        },
    }
}

fn real_main() -> Result<()> {
    println!("[INFO] Parsing command line.");
    let matches = cli().get_matches();
    let cfg = config_from_matches(&matches);
    let threads = matches.get_one::<usize>("threads").copied();

    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
        println!("[INFO] rayon threads = {}", n);
    }
    println!("[INFO] X     : {} ({})", cfg.x_name, cfg.x_gammas.display());
    println!("[INFO] Y     : {} ({})", cfg.y_name, cfg.y_gammas.display());
    println!("[INFO] Size  : {}x{}", cfg.width, cfg.height);
    println!("[INFO] Output: {}", cfg.png_file.display());

    compare::run_compare(&cfg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_required_flags_and_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "compare_pearsons",
                "--xgammas",
                "a.tsv",
                "--xname",
                "Model A",
                "--ygammas",
                "b.tsv",
                "--yname",
                "Model B",
                "--pngfile",
                "out/cmp.png",
            ])
            .unwrap();
        let cfg = config_from_matches(&matches);

        assert_eq!(cfg.x_gammas, PathBuf::from("a.tsv"));
        assert_eq!(cfg.x_name, "Model A");
        assert_eq!(cfg.y_gammas, PathBuf::from("b.tsv"));
        assert_eq!(cfg.y_name, "Model B");
        assert_eq!(cfg.png_file, PathBuf::from("out/cmp.png"));
        assert_eq!((cfg.width, cfg.height), (1800, 1800));
        assert!(cfg.columns.gene.is_none());
        assert!(matches.get_one::<usize>("threads").is_none());
    }

    #[test]
    fn test_overrides_are_forwarded() {
        let matches = cli()
            .try_get_matches_from([
                "compare_pearsons",
                "--xgammas",
                "a.tsv",
                "--xname",
                "A",
                "--ygammas",
                "b.tsv",
                "--yname",
                "B",
                "--pngfile",
                "cmp.png",
                "--width",
                "900",
                "-T",
                "2",
                "--meas-col",
                "relgamma",
            ])
            .unwrap();
        let cfg = config_from_matches(&matches);
        assert_eq!(cfg.width, 900);
        assert_eq!(cfg.height, 1800);
        assert_eq!(cfg.columns.measured.as_deref(), Some("relgamma"));
        assert_eq!(matches.get_one::<usize>("threads").copied(), Some(2));
    }

    #[test]
    fn test_missing_required_flag_is_rejected() {
        let res = cli().try_get_matches_from([
            "compare_pearsons",
            "--xgammas",
            "a.tsv",
            "--xname",
            "A",
            "--ygammas",
            "b.tsv",
            "--pngfile",
            "cmp.png",
        ]);
        assert!(res.is_err());
    }
}
