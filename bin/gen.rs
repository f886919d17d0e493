use bls_ingest::NutrientCode;
use clap::{Arg, ArgAction, Command};
use std::io::{self, Write};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Generate a deterministic synthetic nutrition dataset (tab-separated) on stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("nutrients")
                .long("nutrients")
                .help("Number of nutrient columns")
                .default_value("5"),
        )
        .arg(
            Arg::new("german_decimals")
                .long("german-decimals")
                .help("Write decimal commas instead of points")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_header")
                .long("no-header")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let rows: u64 = *matches.get_one("rows").unwrap();
    let nutrients: usize = matches.get_one::<String>("nutrients").unwrap().parse()?;
    let german = matches.get_flag("german_decimals");
    let no_header = matches.get_flag("no_header");

    let columns: Vec<&str> = NutrientCode::ALL
        .iter()
        .take(nutrients)
        .map(|code| code.as_str())
        .collect();

    let mut out = io::BufWriter::new(io::stdout().lock());

    if !no_header {
        write!(&mut out, "SBLS\tST\tSTE")?;
        for code in &columns {
            write!(&mut out, "\t{code}")?;
        }
        writeln!(&mut out)?;
    }

    // Deterministic data: code letter cycles through B..U, values are
    // derived from the row/column indices.
    for i in 0..rows {
        let letter = (b'B' + (i % 20) as u8) as char;
        write!(&mut out, "{letter}{i:06}\tLebensmittel {i}\tFood item {i}")?;
        for (c, _) in columns.iter().enumerate() {
            let value = (i as f64) * 0.1 + c as f64;
            if german {
                write!(&mut out, "\t{}", format!("{value:.1}").replace('.', ","))?;
            } else {
                write!(&mut out, "\t{value:.1}")?;
            }
        }
        writeln!(&mut out)?;
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
