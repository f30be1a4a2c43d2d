//! 点击 / 拖动判别：按下到松开之间的指针轨迹决定是「喝一杯」还是「移动窗口」

/// 拖动阈值（设备像素）：相对按下点任一方向位移超过此值即进入拖动
pub const DRAG_THRESHOLD: i32 = 3;

/// 屏幕坐标（设备像素）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 指针按键，只有主键（左键）会开启手势
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Other,
}

/// 手势判别的输出
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureEvent {
    /// 一次点击：计数 +1
    Increment,
    /// 拖动中：窗口相对移动
    MoveBy { dx: i32, dy: i32 },
}

/// 一次按下到松开之间的状态
#[derive(Clone, Copy, Debug)]
struct GestureSession {
    origin: Point,
    last_emitted: Point,
    /// 单调：一旦进入拖动，本次手势内不会退回
    is_dragging: bool,
}

/// 手势判别器。同一时间最多一个进行中的手势
#[derive(Debug, Default)]
pub struct GestureClassifier {
    session: Option<GestureSession>,
}

impl GestureClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否有进行中的手势
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some_and(|s| s.is_dragging)
    }

    /// 按下。非主键或已有手势时忽略，返回是否开启了新手势
    pub fn press(&mut self, button: PointerButton, point: Point) -> bool {
        if button != PointerButton::Primary || self.session.is_some() {
            return false;
        }
        self.session = Some(GestureSession {
            origin: point,
            last_emitted: point,
            is_dragging: false,
        });
        true
    }

    /// 指针移动。阈值按原始按下点判断，移动量按上次发出点增量计算
    pub fn moved(&mut self, point: Point) -> Option<GestureEvent> {
        let session = self.session.as_mut()?;

        if !session.is_dragging {
            let dx = point.x - session.origin.x;
            let dy = point.y - session.origin.y;
            if dx.abs().max(dy.abs()) > DRAG_THRESHOLD {
                session.is_dragging = true;
                log::debug!("gesture became drag at ({}, {})", point.x, point.y);
            }
        }

        if !session.is_dragging {
            return None;
        }
        let dx = point.x - session.last_emitted.x;
        let dy = point.y - session.last_emitted.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        session.last_emitted = point;
        Some(GestureEvent::MoveBy { dx, dy })
    }

    /// 松开。未拖动过则产生一次 Increment；无论结果手势都结束
    pub fn release(&mut self, button: PointerButton) -> Option<GestureEvent> {
        if button != PointerButton::Primary {
            return None;
        }
        let session = self.session.take()?;
        (!session.is_dragging).then_some(GestureEvent::Increment)
    }

    /// 丢弃进行中的手势，不产生任何事件（失焦、指针离开窗口等）
    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            log::debug!("gesture cancelled");
        }
    }
}
