use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress bar over frames, a spinner when the total is unknown.
pub fn create_progress_bar(multi: &MultiProgress, total_frames: Option<u64>) -> Result<ProgressBar> {
    let pb = match total_frames {
        Some(total) => {
            let pb = multi.add(ProgressBar::new(total));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
            )?);
            pb
        }
        None => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
            )?);
            pb
        }
    };

    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message("Analysing frames");
    Ok(pb)
}
