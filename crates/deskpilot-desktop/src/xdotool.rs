//! [`DesktopSandbox`] on an X11 display, driven by `xdotool`.
//!
//! Screenshots come from ImageMagick `import -window root png:-`.

use crate::keys::to_xdotool_chord;
use crate::runner::{CommandOutput, CommandRunner};
use crate::{Button, DesktopError, DesktopSandbox, Resolution, Result, ScrollDirection};
use async_trait::async_trait;
use tracing::{debug, info};

/// Tuning for [`XdotoolDesktop`].
#[derive(Debug, Clone)]
pub struct XdotoolOptions {
    /// Characters per `xdotool type` invocation
    pub type_chunk_size: usize,
    /// Delay between typed characters in milliseconds
    pub type_delay_ms: u64,
    /// Delay between the two clicks of a double click in milliseconds
    pub double_click_delay_ms: u64,
}

impl Default for XdotoolOptions {
    fn default() -> Self {
        Self {
            type_chunk_size: 50,
            type_delay_ms: 12,
            double_click_delay_ms: 100,
        }
    }
}

/// A desktop controlled through xdotool on some [`CommandRunner`].
pub struct XdotoolDesktop<R: CommandRunner> {
    runner: R,
    options: XdotoolOptions,
    name: String,
}

impl<R: CommandRunner> XdotoolDesktop<R> {
    pub fn new(runner: R) -> Self {
        Self::with_options(runner, XdotoolOptions::default())
    }

    pub fn with_options(runner: R, options: XdotoolOptions) -> Self {
        let name = format!("xdotool ({})", runner.describe());
        info!("Desktop backend: {}", name);
        Self {
            runner,
            options,
            name,
        }
    }

    async fn xdotool(&self, args: Vec<String>) -> Result<CommandOutput> {
        self.runner.run("xdotool", &args).await?.check("xdotool")
    }
}

fn coords(x: i32, y: i32) -> [String; 2] {
    [x.max(0).to_string(), y.max(0).to_string()]
}

/// Split text into chunks of at most `size` characters.
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl<R: CommandRunner> DesktopSandbox for XdotoolDesktop<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolution(&self) -> Result<Resolution> {
        let output = self.xdotool(vec!["getdisplaygeometry".to_string()]).await?;
        let text = output.stdout_str();
        Resolution::parse(&text).ok_or_else(|| DesktopError::InvalidGeometry(text.trim().to_string()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let args = ["-window", "root", "png:-"].map(String::from);
        let output = self.runner.run("import", &args).await?.check("import")?;
        if output.stdout.is_empty() {
            return Err(DesktopError::CommandFailed {
                program: "import".to_string(),
                status: 0,
                stderr: "empty screenshot".to_string(),
            });
        }
        debug!("Captured screenshot ({} bytes)", output.stdout.len());
        Ok(output.stdout)
    }

    async fn move_mouse(&self, x: i32, y: i32) -> Result<()> {
        let mut args = vec!["mousemove".to_string()];
        args.extend(coords(x, y));
        self.xdotool(args).await?;
        Ok(())
    }

    async fn click_button(&self, x: i32, y: i32, button: Button) -> Result<()> {
        let mut args = vec!["mousemove".to_string()];
        args.extend(coords(x, y));
        args.push("click".to_string());
        args.push(button.x11_number().to_string());
        self.xdotool(args).await?;
        Ok(())
    }

    async fn double_click(&self, x: i32, y: i32) -> Result<()> {
        let mut args = vec!["mousemove".to_string()];
        args.extend(coords(x, y));
        args.extend(
            [
                "click".to_string(),
                "--repeat".to_string(),
                "2".to_string(),
                "--delay".to_string(),
                self.options.double_click_delay_ms.to_string(),
                Button::Left.x11_number().to_string(),
            ],
        );
        self.xdotool(args).await?;
        Ok(())
    }

    async fn write(&self, text: &str) -> Result<()> {
        for chunk in chunk_text(text, self.options.type_chunk_size) {
            self.xdotool(vec![
                "type".to_string(),
                "--delay".to_string(),
                self.options.type_delay_ms.to_string(),
                "--".to_string(),
                chunk,
            ])
            .await?;
        }
        Ok(())
    }

    async fn press(&self, keys: &[String]) -> Result<()> {
        let chord = to_xdotool_chord(keys)?;
        self.xdotool(vec!["key".to_string(), "--".to_string(), chord])
            .await?;
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, clicks: u32) -> Result<()> {
        if clicks == 0 {
            return Ok(());
        }
        self.xdotool(vec![
            "click".to_string(),
            "--repeat".to_string(),
            clicks.to_string(),
            direction.x11_button().to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<()> {
        let mut args = vec!["mousemove".to_string()];
        args.extend(coords(from.0, from.1));
        args.extend(["mousedown".to_string(), "1".to_string(), "mousemove".to_string()]);
        args.extend(coords(to.0, to.1));
        args.extend(["mouseup".to_string(), "1".to_string()]);
        self.xdotool(args).await?;
        Ok(())
    }
}
