//! Derived products from the public waveform archive.

use clap::{Arg, ArgMatches, SubCommand};
use pds_waveforms::{
    derive_archive_key, derive_metadata_key, handle, CommonCmdLineArgs, DecimateRequest,
    Endpoint, Format, LocalStore, NoRespRequest, Nscl, Processor, WaveformErr, WindowBatch,
    WindowSpec,
};
use std::{
    error::Error,
    io::{Read, Write},
    str::FromStr,
};

fn main() {
    env_logger::init();

    if let Err(ref e) = run() {
        println!("error: {}", e);

        let mut err: &dyn Error = e.as_ref();
        while let Some(cause) = err.source() {
            println!("caused by: {}", cause);
            err = cause;
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let app = CommonCmdLineArgs::new_app("pdsw", "Derived products from the waveform archive.")
        .subcommand(
            SubCommand::with_name("key")
                .about("Print the archive and StationXML keys for a channel day.")
                .arg(nscl_arg())
                .arg(
                    Arg::with_name("year")
                        .index(2)
                        .required(true)
                        .takes_value(true)
                        .help("The year."),
                )
                .arg(
                    Arg::with_name("day")
                        .index(3)
                        .required(true)
                        .takes_value(true)
                        .help("Day of the year, 1 to 366."),
                ),
        )
        .subcommand(
            SubCommand::with_name("decimate")
                .about("Keep every Nth sample of a day file.")
                .arg(
                    Arg::with_name("key")
                        .index(1)
                        .required(true)
                        .takes_value(true)
                        .help("Archive key of the day file."),
                )
                .arg(
                    Arg::with_name("factor")
                        .short("f")
                        .long("factor")
                        .required(true)
                        .takes_value(true)
                        .help("Decimation factor."),
                )
                .arg(output_bucket_arg().required(true)),
        )
        .subcommand(
            SubCommand::with_name("noresp")
                .about("Remove the instrument response from a channel day.")
                .arg(nscl_arg())
                .arg(
                    Arg::with_name("day")
                        .index(2)
                        .required(true)
                        .takes_value(true)
                        .help("The day as YYYY,DDD."),
                )
                .arg(output_bucket_arg()),
        )
        .subcommand(
            SubCommand::with_name("window")
                .about("Cut a time window out of a channel day.")
                .arg(nscl_arg())
                .arg(
                    Arg::with_name("start")
                        .index(2)
                        .required(true)
                        .takes_value(true)
                        .help("Start of the window, ISO-8601."),
                )
                .arg(
                    Arg::with_name("end")
                        .index(3)
                        .takes_value(true)
                        .help("End of the window, ISO-8601.")
                        .long_help(concat!(
                            "End of the window, ISO-8601. ",
                            "Without it the whole day is returned."
                        )),
                )
                .arg(
                    Arg::with_name("format")
                        .long("format")
                        .takes_value(true)
                        .possible_values(&["JSON", "MSEED", "SAC"])
                        .case_insensitive(true)
                        .default_value("JSON")
                        .help("Output format."),
                )
                .arg(
                    Arg::with_name("out")
                        .short("o")
                        .long("out")
                        .takes_value(true)
                        .help("File to write to, required for MSEED and SAC."),
                ),
        )
        .subcommand(
            SubCommand::with_name("invoke")
                .about("Answer a serverless event stored in a JSON file.")
                .arg(
                    Arg::with_name("endpoint")
                        .index(1)
                        .required(true)
                        .takes_value(true)
                        .possible_values(&["decimate", "noresp", "timewindow"])
                        .help("The product to request."),
                )
                .arg(
                    Arg::with_name("event")
                        .index(2)
                        .required(true)
                        .takes_value(true)
                        .help("Path to the event, '-' reads standard input."),
                ),
        );

    let (common_args, matches) = CommonCmdLineArgs::matches(app)?;

    match matches.subcommand() {
        ("key", Some(sub_args)) => key(sub_args)?,
        ("decimate", Some(sub_args)) => decimate(common_args, sub_args)?,
        ("noresp", Some(sub_args)) => noresp(common_args, sub_args)?,
        ("window", Some(sub_args)) => window(common_args, sub_args)?,
        ("invoke", Some(sub_args)) => invoke(common_args, sub_args)?,
        _ => {
            println!("{}", matches.usage());
        }
    }

    Ok(())
}

fn nscl_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("nscl")
        .index(1)
        .required(true)
        .takes_value(true)
        .help("Channel as NET.STA.CHAN.LOC, the location may be empty.")
}

fn output_bucket_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("output-bucket")
        .short("b")
        .long("output-bucket")
        .takes_value(true)
        .help("Bucket to write the result to.")
}

fn processor(common_args: CommonCmdLineArgs) -> Processor {
    let store = LocalStore::new(&common_args.root());
    Processor::new(Box::new(store), common_args.into_config())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str, WaveformErr> {
    args.value_of(name)
        .ok_or_else(|| WaveformErr::Validation(format!("missing argument {}", name)))
}

fn number<T: FromStr>(args: &ArgMatches, name: &str) -> Result<T, WaveformErr> {
    let value = required(args, name)?;
    value
        .parse()
        .map_err(|_| WaveformErr::Validation(format!("{} is not a valid {}", value, name)))
}

fn key(sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let nscl = Nscl::parse(required(sub_args, "nscl")?)?;
    let year: i32 = number(sub_args, "year")?;
    let day: u32 = number(sub_args, "day")?;

    println!("{}", derive_archive_key(&nscl, year, day)?);
    println!("{}", derive_metadata_key(nscl.network(), nscl.station())?);

    Ok(())
}

fn decimate(common_args: CommonCmdLineArgs, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let request = DecimateRequest {
        s3_key: required(sub_args, "key")?.to_owned(),
        s3_input_bucket: Some(common_args.input_bucket().to_owned()),
        s3_output_bucket: required(sub_args, "output-bucket")?.to_owned(),
        decimation_factor: number(sub_args, "factor")?,
    };

    let output = processor(common_args).decimated(&request)?;
    println!("{}", output.output_key);

    Ok(())
}

fn noresp(common_args: CommonCmdLineArgs, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let mut config = common_args.into_config();
    if let Some(bucket) = sub_args.value_of("output-bucket") {
        config.output_bucket = Some(bucket.to_owned());
    }

    let store = LocalStore::new(&config.store_root);
    let processor = Processor::new(Box::new(store), config);

    let request = NoRespRequest {
        day: required(sub_args, "day")?.to_owned(),
        nscl: required(sub_args, "nscl")?.to_owned(),
    };

    let output = processor.noresp(&request)?;
    println!("{}", output.output_key);

    Ok(())
}

fn window(common_args: CommonCmdLineArgs, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let nscl = Nscl::parse(required(sub_args, "nscl")?)?;
    let requested = WindowSpec {
        network: nscl.network().to_owned(),
        station: nscl.station().to_owned(),
        channel: nscl.channel().to_owned(),
        location: nscl.location().to_owned(),
        starttime: required(sub_args, "start")?.to_owned(),
        endtime: sub_args.value_of("end").map(str::to_owned),
    };

    let format = required(sub_args, "format")?.to_uppercase();
    let processor = processor(common_args);

    if format == "JSON" {
        let batch = WindowBatch {
            windows: vec![requested],
        };

        let records = processor.time_windows(&batch)?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let format = Format::from_str(&format)?;
    let out = sub_args.value_of("out").ok_or_else(|| {
        WaveformErr::Validation(format!("--out is required for {} output", format))
    })?;

    let bytes = processor.export_window(&requested.to_request()?, format)?;
    std::fs::File::create(out)?.write_all(&bytes)?;
    println!("wrote {} bytes to {}", bytes.len(), out);

    Ok(())
}

fn invoke(common_args: CommonCmdLineArgs, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let endpoint = Endpoint::from_str(required(sub_args, "endpoint")?)?;

    let path = required(sub_args, "event")?;
    let mut text = String::new();
    if path == "-" {
        std::io::stdin().read_to_string(&mut text)?;
    } else {
        std::fs::File::open(path)?.read_to_string(&mut text)?;
    }
    let event = serde_json::from_str(&text)?;

    let response = handle(endpoint, event, &processor(common_args))?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
