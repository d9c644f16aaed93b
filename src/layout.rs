// src/layout.rs - 卡片布局描述（渲染器的输入）

use image::{Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// 图片来源；跨域且未开放 CORS 的图片截图时不可读
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote { cors: bool },
}

impl Origin {
    pub fn readable(&self) -> bool {
        !matches!(self, Origin::Remote { cors: false })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub offset_x: i32,
    pub offset_y: i32,
    pub spread: u32,
    pub color: Rgba<u8>,
}

/// 进行中的入场动画；`progress` 0.0–1.0，会压低节点的不透明度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animation {
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Fill(Rgba<u8>),
    Image { pixels: RgbaImage, origin: Origin },
    /// `size` 是 5×7 点阵字体的放大倍数
    Text { text: String, color: Rgba<u8>, size: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub rect: Rect,
    pub content: Content,
    pub radius: u32,
    pub opacity: f32,
    pub blend: BlendMode,
    pub shadow: Option<Shadow>,
    pub animation: Option<Animation>,
}

impl Node {
    pub fn fill(rect: Rect, color: Rgba<u8>) -> Self {
        Self::with_content(rect, Content::Fill(color))
    }

    pub fn image(rect: Rect, pixels: RgbaImage, origin: Origin) -> Self {
        Self::with_content(rect, Content::Image { pixels, origin })
    }

    pub fn text(x: i32, y: i32, text: impl Into<String>, color: Rgba<u8>, size: u32) -> Self {
        let text = text.into();
        let (w, h) = crate::font::measure(&text, size);
        Self::with_content(Rect::new(x, y, w, h), Content::Text { text, color, size })
    }

    fn with_content(rect: Rect, content: Content) -> Self {
        Self {
            rect,
            content,
            radius: 0,
            opacity: 1.0,
            blend: BlendMode::Normal,
            shadow: None,
            animation: None,
        }
    }

    pub fn rounded(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn shadow(mut self, shadow: Shadow) -> Self {
        self.shadow = Some(shadow);
        self
    }

    pub fn animated(mut self, progress: f32) -> Self {
        self.animation = Some(Animation { progress });
        self
    }

    /// 实际绘制用的不透明度（含动画进度）
    pub fn effective_opacity(&self) -> f32 {
        let anim = self.animation.map_or(1.0, |a| a.progress.clamp(0.0, 1.0));
        (self.opacity * anim).clamp(0.0, 1.0)
    }
}

/// 一张已排好版的卡片：逻辑像素尺寸 + 自底向上的绘制节点
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    /// None 表示透明背景
    pub background: Option<Rgba<u8>>,
    /// 是否挂载在可见的渲染目标上
    pub attached: bool,
    pub nodes: Vec<Node>,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: None,
            attached: true,
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// 宽高比（宽 / 高）
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// 复制一份用于截图：去阴影、停动画、混合模式归一、背景强制不透明。
    /// 原布局保持不变。
    pub fn normalized(&self, background: Rgba<u8>) -> Layout {
        let mut copy = self.clone();
        copy.background = Some(Rgba([background[0], background[1], background[2], 255]));
        for node in &mut copy.nodes {
            node.shadow = None;
            node.animation = None;
            node.blend = BlendMode::Normal;
        }
        copy
    }
}
