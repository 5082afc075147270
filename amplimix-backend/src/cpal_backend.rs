use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{AudioBackend, BackendError, DeviceInfo, DiagnosticEvent, DiagnosticsCb, RenderFn};

/// Worker-thread-backed CPAL backend: the public handle is `Send`/`Sync`
/// and talks to a dedicated thread owning the non-`Send` CPAL `Stream`
/// through a control channel, exactly as in the teacher's
/// `audio-backend::CpalAudioBackend`.
pub struct CpalAudioBackend {
    inner: Arc<CpalBackendInner>,
}

struct CpalBackendInner {
    info: DeviceInfo,
    render: Arc<Mutex<Option<RenderFn>>>,
    frames: AtomicU64,
    ctrl_tx: Sender<CtrlMsg>,
}

enum CtrlMsg {
    SetRender(Option<RenderFn>),
    Start,
    Stop,
    SetDiagnostics(Option<DiagnosticsCb>),
    Shutdown,
}

impl CpalAudioBackend {
    pub fn new() -> Result<Self, BackendError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(BackendError::DeviceNotFound)?;

        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| BackendError::Other(e.to_string()))?
            .collect::<Vec<_>>();

        if supported_configs.is_empty() {
            return Err(BackendError::UnsupportedFormat("no supported configs".into()));
        }

        let chosen = supported_configs
            .iter()
            .rev()
            .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
            .cloned()
            .or_else(|| supported_configs.pop())
            .unwrap();

        let config = chosen.with_max_sample_rate().config();

        let buffer_frames = match config.buffer_size {
            cpal::BufferSize::Fixed(n) => n as usize,
            cpal::BufferSize::Default => 0_usize,
        };

        let info = DeviceInfo {
            sample_rate: config.sample_rate.0,
            buffer_size: buffer_frames,
            channels: config.channels as u16,
        };

        let (tx, rx) = unbounded::<CtrlMsg>();

        let inner = Arc::new(CpalBackendInner {
            info,
            render: Arc::new(Mutex::new(None)),
            frames: AtomicU64::new(0),
            ctrl_tx: tx,
        });

        let inner_worker = inner.clone();
        thread::spawn(move || {
            worker_loop(device, config, rx, inner_worker);
        });

        Ok(Self { inner })
    }
}

fn worker_loop(device: Device, config: StreamConfig, rx: Receiver<CtrlMsg>, inner: Arc<CpalBackendInner>) {
    let channels = config.channels as usize;
    let mut diagnostics: Option<DiagnosticsCb> = None;
    let mut stream_opt: Option<cpal::Stream> = None;

    loop {
        while let Ok(msg) = rx.try_recv() {
            match msg {
                CtrlMsg::SetRender(opt) => {
                    *inner.render.lock().unwrap() = opt;
                }
                CtrlMsg::Start => {
                    if stream_opt.is_none() {
                        let inner_for_cb = inner.clone();
                        let channels_local = channels;
                        let sample_rate = config.sample_rate.0;

                        let diagnostics_for_err_cb = diagnostics.clone();
                        let err_cb = move |err| {
                            tracing::error!(%err, "cpal stream error");
                            if let Some(cb) = &diagnostics_for_err_cb {
                                let cb_clone = cb.clone();
                                std::thread::spawn(move || cb_clone(DiagnosticEvent::XRun { count: 1 }));
                            }
                        };

                        let data_cb = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                            let opt_render = inner_for_cb.render.lock().unwrap().clone();
                            if let Some(render) = opt_render.as_ref() {
                                let frames = data.len() / channels_local;
                                let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                    (render)(data, sample_rate, frames);
                                }));
                                if res.is_err() {
                                    data.iter_mut().for_each(|s| *s = 0.0);
                                }
                            } else {
                                data.iter_mut().for_each(|s| *s = 0.0);
                            }

                            let frames_written = (data.len() / channels_local) as u64;
                            inner_for_cb.frames.fetch_add(frames_written, Ordering::Relaxed);
                        };

                        match device.build_output_stream(&config, data_cb, err_cb, None) {
                            Ok(s) => {
                                if let Err(e) = s.play() {
                                    tracing::error!(%e, "failed to play stream");
                                } else {
                                    stream_opt = Some(s);
                                }
                            }
                            Err(e) => {
                                tracing::error!(%e, "failed to build stream");
                                if let Some(cb) = &diagnostics {
                                    let cb_clone = cb.clone();
                                    std::thread::spawn(move || {
                                        cb_clone(DiagnosticEvent::Other(format!("stream build failed: {e}")))
                                    });
                                }
                            }
                        }
                    }
                }
                CtrlMsg::Stop => {
                    stream_opt = None;
                }
                CtrlMsg::SetDiagnostics(cb) => {
                    diagnostics = cb;
                }
                CtrlMsg::Shutdown => {
                    return;
                }
            }
        }

        thread::sleep(Duration::from_millis(2));
    }
}

impl AudioBackend for CpalAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        self.inner
            .ctrl_tx
            .send(CtrlMsg::SetRender(Some(render)))
            .map_err(|_| BackendError::Other("ctrl channel closed".into()))?;
        self.inner
            .ctrl_tx
            .send(CtrlMsg::Start)
            .map_err(|_| BackendError::Other("ctrl channel closed".into()))?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.inner
            .ctrl_tx
            .send(CtrlMsg::Stop)
            .map_err(|_| BackendError::Other("ctrl channel closed".into()))?;
        self.inner
            .ctrl_tx
            .send(CtrlMsg::SetRender(None))
            .map_err(|_| BackendError::Other("ctrl channel closed".into()))?;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.inner.info.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.inner.info.buffer_size
    }

    fn channels(&self) -> u16 {
        self.inner.info.channels
    }

    fn frames_since_start(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) {
        self.inner.ctrl_tx.send(CtrlMsg::SetDiagnostics(cb)).ok();
    }
}

impl Drop for CpalAudioBackend {
    fn drop(&mut self) {
        self.inner.ctrl_tx.send(CtrlMsg::Shutdown).ok();
    }
}
