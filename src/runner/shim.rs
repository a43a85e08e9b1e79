use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Directory the shim writes captured canvases into.
pub const SINK_DIR_ENV: &str = "LAB_REPORT_SINK_DIR";

static FIGURE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^figure_(\d+)\.png$").expect("static regex"));

/// Runs before the submitted script in the same interpreter. It forces a
/// non-interactive backend, counts canvas creations, and turns every
/// `pyplot.show()` into a save of the current canvas as `figure_<n>.png`
/// (n = display call order, from 1) followed by the original no-op show.
/// The script itself then runs unmodified as `__main__`, and an uncaught
/// exception is reported without the prologue's own frames.
const PROLOGUE: &str = r#"import os
import runpy
import sys
import traceback


def _lab_report_install_sink(sink_dir):
    try:
        import matplotlib
        matplotlib.use("Agg")
        import matplotlib.pyplot as plt
    except Exception:
        return

    import functools
    import warnings

    original_figure = plt.figure
    original_show = plt.show
    state = {"canvases": 0, "displays": 0}

    @functools.wraps(original_figure)
    def figure(*args, **kwargs):
        fig = original_figure(*args, **kwargs)
        state["canvases"] += 1
        return fig

    @functools.wraps(original_show)
    def show(*args, **kwargs):
        state["displays"] += 1
        plt.savefig(os.path.join(sink_dir, "figure_%d.png" % state["displays"]))
        with warnings.catch_warnings():
            warnings.simplefilter("ignore")
            return original_show(*args, **kwargs)

    plt.figure = figure
    plt.show = show


def _lab_report_main():
    _lab_report_install_sink(os.environ.get("LAB_REPORT_SINK_DIR") or os.getcwd())
    script = sys.argv[1]
    sys.argv = sys.argv[1:]
    try:
        runpy.run_path(script, run_name="__main__")
    except SystemExit:
        raise
    except BaseException as exc:
        # Report from the script's first frame on; a failure before any
        # script frame (a syntax error) prints without a traceback.
        target = os.path.abspath(script)
        tb = exc.__traceback__
        while tb is not None and os.path.abspath(tb.tb_frame.f_code.co_filename) != target:
            tb = tb.tb_next
        traceback.print_exception(type(exc), exc, tb)
        sys.stderr.flush()
        sys.exit(1)


_lab_report_main()
"#;

#[derive(Debug, Clone)]
pub struct CaptureShim {
    filename: String,
}

impl CaptureShim {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// Writes the prologue into `dir` and returns its path.
    pub fn install(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, PROLOGUE)?;
        Ok(path)
    }
}

/// The `n` of a `figure_<n>.png` file name.
pub fn figure_index(file_name: &str) -> Option<u32> {
    FIGURE_NAME
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn figure_name(n: u32) -> String {
    format!("figure_{n}.png")
}
