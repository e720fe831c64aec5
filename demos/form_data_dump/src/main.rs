//! multipart/form-data ボディをデコードして内容を表示する例
//!
//! 使い方:
//!   # Content-Type ヘッダー値を指定
//!   cargo run -p form_data_dump -- body.bin \
//!     --content-type 'multipart/form-data; boundary=----abc'
//!
//!   # 境界を直接指定し、ファイルパートを残す
//!   cargo run -p form_data_dump -- body.bin --boundary ----abc --spool-dir ./out --keep
//!
//! ログは RUST_LOG=trace で有効になる。

use std::sync::Arc;
use std::time::Duration;

use shiguredo_multipart::{DiskStorage, MultipartLimits, TempStorage};
use tokio_multipart::FormDataReader;

struct DumpOptions {
    path: String,
    content_type: Option<String>,
    boundary: Option<String>,
    chunk_size: usize,
    spool_dir: Option<String>,
    max_file_size: u64,
    timeout: u64,
    keep: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let Some(options) = parse_args()? else {
        return Ok(());
    };

    let storage: Arc<dyn TempStorage> = match &options.spool_dir {
        Some(dir) => Arc::new(DiskStorage::new(dir)),
        None => Arc::new(DiskStorage::default()),
    };

    let limits = MultipartLimits {
        max_file_size: options.max_file_size,
        ..MultipartLimits::default()
    };
    let reader = FormDataReader::new(storage)
        .read_buffer_size(options.chunk_size)
        .read_timeout(Duration::from_secs(options.timeout))
        .limits(limits);

    let mut file = tokio::fs::File::open(&options.path).await?;
    let form = match (&options.content_type, &options.boundary) {
        (Some(content_type), _) => reader.read(content_type, &mut file).await?,
        (None, Some(boundary)) => reader.read_with_boundary(boundary, &mut file).await?,
        (None, None) => return Err("--content-type or --boundary is required".into()),
    };

    let mut fields: Vec<_> = form.fields().values().collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    for field in fields {
        println!("field {:?} = {:?}", field.name, field.value);
    }

    let (_, files) = form.into_parts();
    let mut files: Vec<_> = files.into_values().collect();
    files.sort_by(|a, b| a.field_name.cmp(&b.field_name));
    for record in files {
        println!(
            "file  {:?}: filename={:?} content_type={} size={}",
            record.field_name,
            record.filename,
            record.content_type.as_deref().unwrap_or("-"),
            record.size
        );
        if options.keep {
            let path = record.stored.path();
            let name = record.stored.persist();
            match path {
                Some(path) => println!("      kept at {}", path.display()),
                None => println!("      kept as {}", name),
            }
        }
    }

    Ok(())
}

fn parse_args() -> Result<Option<DumpOptions>, Box<dyn std::error::Error>> {
    let mut args = noargs::raw_args();
    args.metadata_mut().app_name = "form_data_dump";

    // --help フラグ
    noargs::HELP_FLAG.take_help(&mut args);

    // --version フラグ
    let version_flag: bool = noargs::flag("version")
        .short('V')
        .doc("Show version")
        .take(&mut args)
        .is_present();
    if version_flag {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(None);
    }

    let keep: bool = noargs::flag("keep")
        .doc("Keep spooled files instead of deleting them on exit")
        .take(&mut args)
        .is_present();

    let content_type: Option<String> = noargs::opt("content-type")
        .short('t')
        .doc("Content-Type header value carrying the boundary")
        .take(&mut args)
        .present_and_then(|o| Ok::<_, &str>(o.value().to_string()))
        .map_err(|e| format!("{:?}", e))?;

    let boundary: Option<String> = noargs::opt("boundary")
        .short('b')
        .doc("Boundary string (used when --content-type is not given)")
        .take(&mut args)
        .present_and_then(|o| Ok::<_, &str>(o.value().to_string()))
        .map_err(|e| format!("{:?}", e))?;

    let chunk_size: usize = noargs::opt("chunk-size")
        .short('c')
        .doc("Read size per chunk in bytes")
        .default("8192")
        .take(&mut args)
        .then(|o| o.value().parse())
        .map_err(|e| format!("{:?}", e))?;

    let spool_dir: Option<String> = noargs::opt("spool-dir")
        .doc("Directory for spooled file parts (default: system temp dir)")
        .take(&mut args)
        .present_and_then(|o| Ok::<_, &str>(o.value().to_string()))
        .map_err(|e| format!("{:?}", e))?;

    let max_file_size: u64 = noargs::opt("max-file-size")
        .doc("Maximum size of a single file part in bytes")
        .default("1073741824")
        .take(&mut args)
        .then(|o| o.value().parse())
        .map_err(|e| format!("{:?}", e))?;

    let timeout: u64 = noargs::opt("timeout")
        .doc("Read timeout in seconds")
        .default("60")
        .take(&mut args)
        .then(|o| o.value().parse())
        .map_err(|e| format!("{:?}", e))?;

    // 位置引数: 入力ファイル
    let path: String = noargs::arg("<PATH>")
        .doc("Raw multipart/form-data body to decode")
        .take(&mut args)
        .then(|a| Ok::<_, &str>(a.value().to_string()))
        .map_err(|e| format!("{:?}", e))?;

    // 未知の引数があればエラー、ヘルプが返されたら表示
    if let Some(help) = args.finish().map_err(|e| format!("{:?}", e))? {
        print!("{}", help);
        return Ok(None);
    }

    Ok(Some(DumpOptions {
        path,
        content_type,
        boundary,
        chunk_size,
        spool_dir,
        max_file_size,
        timeout,
        keep,
    }))
}
