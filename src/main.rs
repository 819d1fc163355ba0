use heatline::{AllFiles, FrameSnapshot, SnapshotService, SourceReader, Tracer};

const DEMO_FILE: &str = "demo.rs";

const DEMO_TEXT: &str = "\
fn main() {
  for _ in 0..40 {
    hot();
  }
  done();
}
";

struct DemoSource;

impl SourceReader for DemoSource {
  fn read(&self, _file: &str) -> std::io::Result<String> {
    Ok(DEMO_TEXT.to_string())
  }
}

fn main() {
  env_logger::init();

  let tracer = Tracer::builder().filter(AllFiles).history_levels(4).finish();

  for _ in 0..40 {
    tracer.on_line(DEMO_FILE, 2);
    tracer.on_line(DEMO_FILE, 3);
  }
  tracer.on_line(DEMO_FILE, 5);

  // Pretend execution is currently inside hot() on line 3.
  let frames =
    vec![FrameSnapshot::new(DEMO_FILE, 3, "demo::main").range(35, 40)];
  let provider = move || frames.clone();

  let service = SnapshotService::new(tracer, provider).with_reader(DemoSource);

  println!("=== heat table for {DEMO_FILE} ===");
  match service.file_table(DEMO_FILE) {
    Ok(table) => {
      for row in table.rows {
        let total = row.total.map_or(String::new(), |count| count.to_string());
        let peak =
          row.intensities.iter().copied().max().unwrap_or(0);
        println!("{:>3} {:>6} {:>4}  {}", row.line, total, peak, row.text);
      }
    }
    Err(err) => eprintln!("snapshot failed: {err}"),
  }

  println!("=== stack ===");
  for entry in service.stack_trace() {
    println!(
      "{}:{} {} included={}  {}",
      entry.file, entry.lineno, entry.qualname, entry.included, entry.snippet
    );
  }
}
