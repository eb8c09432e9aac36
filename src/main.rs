use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use uvcam::{
    export::export_cameras, lister::format_list, media::MediaDevices, CameraDevice, Discovery,
    UsbId, UsbSource,
};

/// Lists the USB Video Class cameras attached to this machine.
#[derive(Parser, Debug)]
#[command(name = "uvcam", version)]
struct Args {
    /// Print the camera list as JSON
    #[arg(short, long)]
    json: bool,

    /// Also list video devices the OS knows about but USB discovery didn't report
    #[arg(short, long)]
    native: bool,

    /// Print only the number of cameras
    #[arg(short, long, conflicts_with = "find")]
    count: bool,

    /// Show only the camera with these ids (hex, as printed by `lsusb`, e.g. `046d 082d`)
    #[arg(long, num_args = 2, value_names = ["VENDOR", "PRODUCT"])]
    find: Option<Vec<String>>,

    /// Write a timestamped JSON snapshot of the list into DIR
    #[arg(long, value_name = "DIR")]
    export: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let discovery = Discovery::system();
    let status = execute(
        &args,
        &discovery,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    );
    ExitCode::from(status)
}

const SUCCESS: u8 = 0;
/// Discovery failed, or `--find` matched nothing.
const FAILURE: u8 = 1;

/// Runs the command, reports failures on `err` and returns the exit status.
fn execute<S: UsbSource, M: MediaDevices>(
    args: &Args,
    discovery: &Discovery<S, M>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> u8 {
    match run(args, discovery, out, err) {
        Ok(status) => status,
        Err(e) => {
            let _ = writeln!(err, "error: {}", e);
            FAILURE
        }
    }
}

fn run<S: UsbSource, M: MediaDevices>(
    args: &Args,
    discovery: &Discovery<S, M>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> uvcam::Result<u8> {
    if let Some([vendor, product]) = args.find.as_deref() {
        let found = if args.native {
            find(discovery.unified_list()?, vendor, product)
        } else {
            discovery
                .lister()
                .find_camera(vendor.as_str(), product.as_str())?
        };
        return match found {
            Some(cam) => {
                print_cameras(out, &[cam], args.json)?;
                Ok(SUCCESS)
            }
            None => {
                writeln!(err, "camera {}:{} not found", vendor, product)?;
                Ok(FAILURE)
            }
        };
    }

    if args.count && !args.native && args.export.is_none() {
        writeln!(out, "{}", discovery.lister().camera_count()?)?;
        return Ok(SUCCESS);
    }

    let cameras = if args.native {
        discovery.unified_list()?
    } else {
        discovery.lister().list_cameras()?
    };

    if let Some(dir) = &args.export {
        let path = export_cameras(&cameras, dir)?;
        writeln!(err, "exported to {}", path.display())?;
    }

    if args.count {
        writeln!(out, "{}", cameras.len())?;
    } else {
        print_cameras(out, &cameras, args.json)?;
    }
    Ok(SUCCESS)
}

fn find(cameras: Vec<CameraDevice>, vendor: &str, product: &str) -> Option<CameraDevice> {
    let vendor = UsbId::from(vendor).resolve()?;
    let product = UsbId::from(product).resolve()?;
    cameras
        .into_iter()
        .find(|cam| cam.matches_ids(vendor, product))
}

fn print_cameras(
    out: &mut impl Write,
    cameras: &[CameraDevice],
    json: bool,
) -> uvcam::Result<()> {
    if json {
        writeln!(out, "{}", uvcam::ipc::to_json(cameras)?)?;
    } else {
        writeln!(out, "{}", format_list(cameras))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use uvcam::{
        lister::RawDevice,
        media::{MediaDeviceInfo, StreamRequest, VideoStream},
        Error,
    };

    use super::*;

    struct Usb(std::result::Result<Vec<RawDevice>, rusb::Error>);

    impl UsbSource for Usb {
        fn discover(&self) -> uvcam::Result<Vec<RawDevice>> {
            self.0.clone().map_err(Error::from)
        }
    }

    struct Media(Vec<MediaDeviceInfo>);

    impl MediaDevices for Media {
        fn enumerate(&self) -> uvcam::Result<Vec<MediaDeviceInfo>> {
            Ok(self.0.clone())
        }

        fn open(&self, _: &StreamRequest) -> uvcam::Result<Box<dyn VideoStream>> {
            Err(Error::from(rusb::Error::NotSupported))
        }
    }

    fn webcam() -> RawDevice {
        RawDevice {
            name: Some("HD Pro Webcam C920".into()),
            vendor_id: 0x46d,
            product_id: 0x82d,
            address: 4,
        }
    }

    fn discovery(
        usb: std::result::Result<Vec<RawDevice>, rusb::Error>,
    ) -> Discovery<Usb, Media> {
        Discovery::new(
            Usb(usb),
            Media(vec![MediaDeviceInfo::new("Cam B (0fd9:0078)", "/dev/video2")]),
        )
    }

    /// Runs `uvcam` with `argv` and returns the exit code, stdout and stderr.
    fn uvcam(argv: &[&str], discovery: &Discovery<Usb, Media>) -> (u8, String, String) {
        let args = Args::try_parse_from(std::iter::once("uvcam").chain(argv.iter().copied()))
            .unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = execute(&args, discovery, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn prints_formatted_list() {
        let (code, out, err) = uvcam(&[], &discovery(Ok(vec![webcam()])));
        assert_eq!(code, SUCCESS);
        assert!(out.starts_with("Found 1 UVC-compatible camera(s):\n"));
        assert!(out.contains("   Vendor: 0x046d (1133)\n"));
        assert!(err.is_empty());
    }

    #[test]
    fn json_without_cameras_is_an_empty_array() {
        let (code, out, _) = uvcam(&["--json"], &discovery(Ok(Vec::new())));
        assert_eq!(code, SUCCESS);
        assert_eq!(out.trim(), "[]");
    }

    #[test]
    fn access_denied_prints_guidance_and_fails() {
        let (code, out, err) = uvcam(&[], &discovery(Err(rusb::Error::Access)));
        assert_eq!(code, FAILURE);
        assert!(out.is_empty());
        assert!(err.starts_with("error: "));
        assert!(err.contains("elevated privileges"));
        assert!(!err.contains(&rusb::Error::Access.to_string()));
    }

    #[test]
    fn other_discovery_failures_fail() {
        let (code, _, err) = uvcam(&["--count"], &discovery(Err(rusb::Error::Busy)));
        assert_eq!(code, FAILURE);
        assert!(err.contains(&rusb::Error::Busy.to_string()));
    }

    #[test]
    fn find_hit_and_miss() {
        let d = discovery(Ok(vec![webcam()]));

        let (code, out, _) = uvcam(&["--find", "046d", "082d", "--json"], &d);
        assert_eq!(code, SUCCESS);
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json[0]["name"], "HD Pro Webcam C920");

        let (code, out, err) = uvcam(&["--find", "1234", "5678"], &d);
        assert_eq!(code, FAILURE);
        assert!(out.is_empty());
        assert_eq!(err, "camera 1234:5678 not found\n");

        // OS-only devices are only searched with --native
        let (code, _, _) = uvcam(&["--find", "0fd9", "0078"], &d);
        assert_eq!(code, FAILURE);
        let (code, out, _) = uvcam(&["--find", "0fd9", "0078", "--native"], &d);
        assert_eq!(code, SUCCESS);
        assert!(out.contains("Cam B (0fd9:0078)"));
    }

    #[test]
    fn count_with_native_devices() {
        let d = discovery(Ok(vec![webcam()]));
        assert_eq!(uvcam(&["--count"], &d).1, "1\n");
        assert_eq!(uvcam(&["--count", "--native"], &d).1, "2\n");
    }

    #[test]
    fn count_and_find_conflict() {
        let parsed = Args::try_parse_from(["uvcam", "--count", "--find", "1", "2"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn export_writes_document_and_still_counts() {
        let dir = tempfile::tempdir().unwrap();
        let d = discovery(Ok(vec![webcam()]));
        let dir_arg = dir.path().to_str().unwrap();

        let (code, out, err) = uvcam(&["--export", dir_arg, "--count", "--native"], &d);
        assert_eq!(code, SUCCESS);
        assert_eq!(out, "2\n");
        assert!(err.starts_with("exported to "));

        let files = fs::read_dir(dir.path()).unwrap().collect::<Vec<_>>();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(doc["count"], 2);
    }
}
