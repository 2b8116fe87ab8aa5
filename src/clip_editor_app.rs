use crate::audio_thread::AudioThread;
use crate::config::EditorConfig;
use crate::cutter::{CutJob, CutterService, CutterStatus};
use crate::decoder::{DecodedSource, SourceLoader};
use crate::selection::{SelectionEngine, SelectionEvent};
use crate::source::AudioFile;
use crate::time_range;
use crate::transport::{PlaybackStatus, TransportController};
use crate::waveform_widget::{WaveformStatus, WaveformWidget};
use eframe::egui;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// ClipEditorApp controls application UI.
pub struct ClipEditorApp {
    config: EditorConfig,

    /// Decodes audio files off the UI thread. Spawned on the first frame, as it needs the UI
    /// context handle.
    loader: Option<SourceLoader>,
    /// Produces cut files off the UI thread. Spawned together with the loader.
    cutter: Option<CutterService>,

    /// File opened by user.
    original_file: Option<AudioFile>,
    /// File currently shown, differs from `original_file` after a cut.
    current_file: Option<AudioFile>,
    /// File to open once the workers are running.
    pending_file: Option<AudioFile>,
    /// Decoded audio of `current_file`.
    decoded: Option<DecodedSource>,
    load_error: Option<String>,

    selection: SelectionEngine,
    selection_events: Receiver<SelectionEvent>,
    transport: TransportController<AudioThread>,
    waveform: WaveformWidget,

    cut_job: Option<CutJob>,
    /// Result of the last cut or download, shown in the footer.
    status_message: Option<String>,
}

impl ClipEditorApp {
    pub fn new(config: EditorConfig) -> Self {
        let (events_sender, selection_events) = std::sync::mpsc::channel();

        Self {
            loader: None,
            cutter: None,
            original_file: None,
            current_file: None,
            pending_file: None,
            decoded: None,
            load_error: None,
            selection: SelectionEngine::new(config.selection.clone(), events_sender),
            selection_events,
            transport: TransportController::new(config.transport.initial_volume),
            waveform: WaveformWidget::new(&config.waveform),
            cut_job: None,
            status_message: None,
            config,
        }
    }

    /// Opens `file` as soon as the UI is running.
    pub fn with_file(mut self, file: AudioFile) -> Self {
        self.pending_file = Some(file);
        self
    }

    /// Makes `file` the opened and the current file.
    fn open(&mut self, file: AudioFile) {
        log::info!("[Clip Editor App] Opening {}", file.name);
        self.original_file = Some(file.clone());
        self.status_message = None;
        self.set_source(file);
    }

    /// Replaces the current audio source and starts decoding it.
    ///
    /// Playback of the previous source is stopped and the selection is cleared right away, the
    /// new source becomes playable once decoding finishes.
    fn set_source(&mut self, file: AudioFile) {
        self.transport.detach();
        self.selection.reset();
        self.selection.set_duration(None);
        self.waveform.reset();
        self.decoded = None;
        self.load_error = None;

        if let Some(loader) = self.loader.as_mut() {
            let generation = loader.load(file.bytes.clone());
            log::info!("[Clip Editor App] Decoding {} (generation {generation}) ...", file.name);
        }
        self.current_file = Some(file);
    }

    /// Picks up a finished decode and binds it to the transport.
    fn poll_decoder(&mut self, ctx: &egui::Context) {
        let Some(result) = self.loader.as_mut().and_then(SourceLoader::poll) else {
            return;
        };

        match result {
            Ok(source) => {
                let duration = source.audio.duration();
                log::info!("[Clip Editor App] Decoded {duration:.3}s of audio");

                self.selection.set_duration(Some(duration));
                let media = AudioThread::spawn(
                    ctx,
                    Arc::clone(&source.audio),
                    self.transport.volume(),
                    self.config.transport.sample_interval(),
                );
                self.transport.attach(media, duration);
                self.decoded = Some(source);
            }
            Err(error) => {
                log::error!("[Clip Editor App] Failed to decode audio: {error}");
                self.load_error = Some(error.to_string());
            }
        }
    }

    /// Picks up a finished cut.
    fn poll_cut(&mut self) {
        let Some(result) = self.cut_job.as_mut().and_then(CutJob::try_take) else {
            return;
        };
        self.cut_job = None;

        match result {
            Ok(file) => {
                self.status_message = Some(format!("Вырезано: {}", file.name));
                self.set_source(file);
            }
            Err(error) => {
                // The pre-cut source stays loaded
                self.status_message = Some(format!("Ошибка: {error}"));
            }
        }
    }

    /// Forwards committed selection changes to the transport.
    fn apply_selection_events(&mut self) {
        for event in self.selection_events.try_iter() {
            match event {
                SelectionEvent::RangeChanged(range) => self.transport.set_range(range),
                SelectionEvent::Seek(time) => self.transport.seek(time),
            }
        }
    }

    /// Controls behavior of opening file UI button.
    ///
    /// # Parameters
    ///
    /// * `ui` - `egui::UI` for placing the button on.
    fn open_file_button(&mut self, ui: &mut egui::Ui) {
        if ui.button("Открыть файл...").clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("Аудио файл", &["mp3", "wav", "flac", "ogg", "m4a"])
                .pick_file()
            {
                match AudioFile::open(&path) {
                    Ok(file) => self.open(file),
                    Err(error) => {
                        log::error!(
                            "[Clip Editor App] Failed to read {}: {error}",
                            path.display()
                        );
                        self.status_message = Some(format!("Не удалось открыть файл: {error}"));
                    }
                }
            }
        }
    }

    /// Controls audio playback part of the UI.
    ///
    /// # Parameters
    ///
    /// * `ui` - `egui::UI` for placing audio playback controls on.
    fn playback_control(&mut self, ui: &mut egui::Ui) {
        let enabled = self.transport.has_media();
        let state = self.transport.state();
        let action = if let PlaybackStatus::Playing = state.status {
            "Пауза"
        } else {
            "Играть"
        };

        ui.horizontal(|ui| {
            if ui.add_enabled(enabled, egui::Button::new("Стоп")).clicked() {
                self.transport.stop();
            }

            if ui.add_enabled(enabled, egui::Button::new(action)).clicked() {
                self.transport.toggle_play();
            }

            if ui
                .add_enabled(enabled, egui::Button::new("Повтор").selected(state.looping))
                .clicked()
            {
                self.transport.toggle_loop();
            }

            let muted = state.volume == 0.0;
            let mute_label = if muted { "Со звуком" } else { "Без звука" };
            if ui.button(mute_label).clicked() {
                self.transport.toggle_mute();
            }

            let mut volume = state.volume;
            if ui
                .add(egui::Slider::new(&mut volume, 0.0..=1.0).show_value(false))
                .changed()
            {
                self.transport.set_volume(volume);
            }
        });
    }

    /// Shows the waveform with the selection and the playhead.
    ///
    /// # Parameters
    ///
    /// * `ui` - `egui::UI` for placing the waveform on.
    fn waveform_view(&mut self, ui: &mut egui::Ui) {
        let status = match (&self.decoded, &self.load_error) {
            (Some(source), _) => WaveformStatus::Ready(source),
            (None, Some(error)) => WaveformStatus::Failed(error),
            (None, None) if self.current_file.is_some() => WaveformStatus::Loading,
            (None, None) => WaveformStatus::Empty,
        };
        let duration = time_range::effective_duration(self.transport.duration());

        self.waveform.show(
            ui,
            &mut self.selection,
            status,
            self.transport.current_time(),
            duration,
        );
    }

    /// Shows the time, the selected range and the cut and download buttons.
    ///
    /// # Parameters
    ///
    /// * `ui` - `egui::UI` for placing the footer on.
    fn footer(&mut self, ui: &mut egui::Ui) {
        let range = self.selection.committed_range();

        ui.horizontal(|ui| {
            let current_time = self.transport.state().current_time.unwrap_or(0.0);
            let duration = self.transport.duration().unwrap_or(0.0);
            ui.label(format!(
                "{} / {}",
                time_range::format_time(current_time),
                time_range::format_time(duration)
            ));

            if let Some(range) = &range {
                ui.separator();
                ui.label(format!("Выделено: {}", time_range::format_time_range(range)));
            }

            ui.separator();

            let cutter_ready = self
                .cutter
                .as_ref()
                .is_some_and(|cutter| cutter.status() != CutterStatus::Loading);
            let busy = self.cut_job.as_ref().is_some_and(CutJob::is_busy);
            let can_cut = range.is_some() && self.decoded.is_some() && cutter_ready && !busy;
            let cut_label = if busy { "Обработка..." } else { "Вырезать" };

            if ui.add_enabled(can_cut, egui::Button::new(cut_label)).clicked() {
                self.start_cut();
            }
            if self.cutter.as_ref().map(CutterService::status) == Some(CutterStatus::Loading) {
                ui.spinner();
            }

            let edited = match (&self.current_file, &self.original_file) {
                (Some(current), Some(original)) => !current.same_source(original),
                _ => false,
            };
            if ui
                .add_enabled(edited && !busy, egui::Button::new("Скачать"))
                .clicked()
            {
                self.download();
            }
        });

        if let Some(message) = &self.status_message {
            ui.label(message);
        }
    }

    fn start_cut(&mut self) {
        let (Some(cutter), Some(file), Some(range)) = (
            self.cutter.as_ref(),
            self.current_file.clone(),
            self.selection.committed_range(),
        ) else {
            return;
        };

        log::info!(
            "[Clip Editor App] Cutting {} to {}",
            file.name,
            time_range::format_time_range(&range)
        );
        self.transport.stop();
        self.status_message = None;
        self.cut_job = Some(cutter.cut(file, range));
    }

    /// Saves the current file where the user tells to.
    fn download(&mut self) {
        let Some(file) = self.current_file.as_ref() else {
            return;
        };

        let Some(path) = rfd::FileDialog::new().set_file_name(&file.name).save_file() else {
            return;
        };

        match file.save(&path) {
            Ok(()) => {
                log::info!("[Clip Editor App] Saved {}", path.display());
                self.status_message = Some(format!("Сохранено: {}", path.display()));
            }
            Err(error) => {
                log::error!(
                    "[Clip Editor App] Failed to save {}: {error}",
                    path.display()
                );
                self.status_message = Some(format!("Не удалось сохранить файл: {error}"));
            }
        }
    }
}

impl eframe::App for ClipEditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // No workers launched yet, start them:
        if self.loader.is_none() {
            log::info!("[Clip Editor App] Spawning workers ...");
            self.loader = Some(SourceLoader::spawn(ctx));
            self.cutter = Some(CutterService::spawn(ctx));
        }
        if let Some(file) = self.pending_file.take() {
            self.open(file);
        }

        self.poll_decoder(ctx);
        self.poll_cut();
        self.transport.sample();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("Audio Cutter");

                self.open_file_button(ui);

                if let Some(file) = &self.current_file {
                    ui.horizontal(|ui| {
                        ui.label("Открытый файл:");
                        ui.label(file.name.as_str());
                    });
                }

                self.playback_control(ui);
                self.waveform_view(ui);
                self.footer(ui);
            });
        });

        // Selection commits made by this frame's input take effect before the next sample
        self.apply_selection_events();
    }
}
